//! SQL schema for the Tabward SQLite store.
//!
//! Executed once at connection startup. `PRAGMA user_version` records the
//! schema revision for future migrations.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per end user. subject_id stays NULL for accounts created by a
-- payment event until the user first logs in.
CREATE TABLE IF NOT EXISTS accounts (
    account_id  INTEGER PRIMARY KEY,
    subject_id  TEXT UNIQUE,
    email       TEXT NOT NULL UNIQUE COLLATE NOCASE,
    is_paying   INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL          -- RFC 3339 UTC, microseconds
);

-- Replaced wholesale by every blocklist sync.
CREATE TABLE IF NOT EXISTS block_patterns (
    pattern_id  INTEGER PRIMARY KEY,
    subject_id  TEXT NOT NULL REFERENCES accounts(subject_id) ON UPDATE CASCADE,
    pattern     TEXT NOT NULL,
    created_at  TEXT NOT NULL          -- client-supplied
);

-- Never deleted; rewritten in place when a merge changes url/pattern.
CREATE TABLE IF NOT EXISTS history_entries (
    entry_id    INTEGER PRIMARY KEY,
    subject_id  TEXT NOT NULL REFERENCES accounts(subject_id) ON UPDATE CASCADE,
    url         TEXT NOT NULL,
    pattern     TEXT NOT NULL,
    timestamp   TEXT NOT NULL,         -- fixed width, so MAX() and substr() work
    UNIQUE (subject_id, timestamp)
);

CREATE INDEX IF NOT EXISTS block_patterns_subject_idx ON block_patterns(subject_id);
CREATE INDEX IF NOT EXISTS history_pattern_idx        ON history_entries(subject_id, pattern);

PRAGMA user_version = 1;
";
