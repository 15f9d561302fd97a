//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as fixed-width RFC 3339 UTC strings with
//! microsecond precision (`2024-05-01T09:30:00.000000Z`). Fixed width keeps
//! lexicographic order equal to chronological order, and the first ten
//! characters are always the calendar date.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use tabward_core::{
  account::Account,
  blocklist::BlockPattern,
  history::HistoryEntry,
  stats::{DailyCount, PatternCount, Stats},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

fn decode_count(n: i64) -> Result<u64> {
  u64::try_from(n).map_err(|_| Error::Decode(format!("negative count {n}")))
}

// ─── Raw rows ────────────────────────────────────────────────────────────────

/// Raw column values for an `accounts` row.
pub struct RawAccount {
  pub subject_id: Option<String>,
  pub email:      String,
  pub is_paying:  bool,
  pub created_at: String,
}

impl RawAccount {
  pub const COLUMNS: &'static str = "subject_id, email, is_paying, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> { Self::from_row_offset(row, 0) }

  /// Read [`Self::COLUMNS`] starting at column `offset`.
  pub fn from_row_offset(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      subject_id: row.get(offset)?,
      email:      row.get(offset + 1)?,
      is_paying:  row.get(offset + 2)?,
      created_at: row.get(offset + 3)?,
    })
  }

  pub fn into_account(self) -> Result<Account> {
    Ok(Account {
      subject_id: self.subject_id,
      email:      self.email,
      is_paying:  self.is_paying,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw column values for a `block_patterns` row.
pub struct RawPattern {
  pub pattern:    String,
  pub created_at: String,
}

impl RawPattern {
  pub fn into_pattern(self) -> Result<BlockPattern> {
    Ok(BlockPattern {
      pattern:    self.pattern,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw column values for a `history_entries` row.
pub struct RawHistoryEntry {
  pub url:       String,
  pub pattern:   String,
  pub timestamp: String,
}

impl RawHistoryEntry {
  pub fn into_entry(self) -> Result<HistoryEntry> {
    Ok(HistoryEntry {
      url:       self.url,
      pattern:   self.pattern,
      timestamp: decode_dt(&self.timestamp)?,
    })
  }
}

/// Raw aggregate query results, before decoding.
pub struct RawStats {
  pub total:        i64,
  pub last_updated: Option<String>,
  pub daily:        Vec<(String, i64)>,
  pub by_pattern:   Vec<(String, i64)>,
}

impl RawStats {
  pub fn into_stats(self) -> Result<Stats> {
    let daily = self
      .daily
      .into_iter()
      .map(|(date, count)| -> Result<DailyCount> {
        Ok(DailyCount { date: decode_date(&date)?, count: decode_count(count)? })
      })
      .collect::<Result<Vec<_>>>()?;

    let by_pattern = self
      .by_pattern
      .into_iter()
      .map(|(pattern, count)| -> Result<PatternCount> {
        Ok(PatternCount { pattern, count: decode_count(count)? })
      })
      .collect::<Result<Vec<_>>>()?;

    Ok(Stats {
      total_blocked: decode_count(self.total)?,
      last_updated: self.last_updated.as_deref().map(decode_dt).transpose()?,
      daily,
      by_pattern,
    })
  }
}
