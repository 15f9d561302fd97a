//! The SQLite implementation of [`AccountStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::{OptionalExtension as _, TransactionBehavior, types::Value};
use tabward_core::{
  account::{Account, Identity},
  blocklist::{BlockPattern, plan_sync},
  history::{HistoryEntry, MergedEntry, collapse_by_timestamp, merge_action, MergeAction},
  payment::PaymentEffect,
  stats::Stats,
  store::AccountStore,
};

use crate::{
  Result,
  encode::{RawAccount, RawHistoryEntry, RawPattern, RawStats, encode_dt},
  schema::SCHEMA,
};

/// Ids bound per `DELETE … IN (…)`, well under SQLite's host-parameter limit.
const DELETE_BATCH: usize = 500;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Tabward store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// Look up an account row by subject id.
fn account_by_subject(
  conn: &rusqlite::Connection,
  subject_id: &str,
) -> rusqlite::Result<Option<(i64, RawAccount)>> {
  conn
    .query_row(
      &format!("SELECT account_id, {} FROM accounts WHERE subject_id = ?1", RawAccount::COLUMNS),
      rusqlite::params![subject_id],
      |row| Ok((row.get(0)?, RawAccount::from_row_offset(row, 1)?)),
    )
    .optional()
}

/// Look up an account row by email (case-insensitive).
fn account_by_email(
  conn: &rusqlite::Connection,
  email: &str,
) -> rusqlite::Result<Option<(i64, RawAccount)>> {
  conn
    .query_row(
      &format!("SELECT account_id, {} FROM accounts WHERE email = ?1", RawAccount::COLUMNS),
      rusqlite::params![email],
      |row| Ok((row.get(0)?, RawAccount::from_row_offset(row, 1)?)),
    )
    .optional()
}

// ─── AccountStore impl ───────────────────────────────────────────────────────

impl AccountStore for SqliteStore {
  type Error = crate::Error;

  // ── Accounts ──────────────────────────────────────────────────────────────

  async fn ensure_account(&self, identity: &Identity) -> Result<Account> {
    let subject_id = identity.subject_id.clone();
    let email      = identity.email.clone();
    let now_str    = encode_dt(Utc::now());

    let raw: RawAccount = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let account_id = match account_by_subject(&tx, &subject_id)? {
          Some((account_id, existing)) => {
            if !existing.email.eq_ignore_ascii_case(&email) {
              let holder: Option<(i64, Option<String>, bool)> = tx
                .query_row(
                  "SELECT account_id, subject_id, is_paying FROM accounts WHERE email = ?1",
                  rusqlite::params![email],
                  |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;
              match holder {
                // Another linked account still holds the address until its
                // owner next logs in; keep the stored email for now.
                Some((_, Some(other_subject), _)) => {
                  tracing::warn!(
                    %subject_id,
                    %other_subject,
                    "new email is still held by another account; keeping stored email"
                  );
                }
                // An email-only row from a payment: fold its paying flag in
                // before taking the email.
                Some((orphan_id, None, orphan_paying)) => {
                  tx.execute("DELETE FROM accounts WHERE account_id = ?1", rusqlite::params![orphan_id])?;
                  tx.execute(
                    "UPDATE accounts SET email = ?2, is_paying = ?3 WHERE account_id = ?1",
                    rusqlite::params![account_id, email, existing.is_paying || orphan_paying],
                  )?;
                }
                None => {
                  tx.execute(
                    "UPDATE accounts SET email = ?2 WHERE account_id = ?1",
                    rusqlite::params![account_id, email],
                  )?;
                }
              }
            }
            account_id
          }
          None => match account_by_email(&tx, &email)? {
            // Either an email-only row from a payment, or a row whose owner was
            // re-created at the identity provider under a new subject id.
            Some((account_id, _)) => {
              tx.execute(
                "UPDATE accounts SET subject_id = ?2 WHERE account_id = ?1",
                rusqlite::params![account_id, subject_id],
              )?;
              account_id
            }
            None => {
              tx.execute(
                "INSERT INTO accounts (subject_id, email, is_paying, created_at)
                 VALUES (?1, ?2, 0, ?3)",
                rusqlite::params![subject_id, email, now_str],
              )?;
              tx.last_insert_rowid()
            }
          },
        };

        let raw = tx.query_row(
          &format!("SELECT {} FROM accounts WHERE account_id = ?1", RawAccount::COLUMNS),
          rusqlite::params![account_id],
          RawAccount::from_row,
        )?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.into_account()
  }

  async fn apply_payment(&self, email: &str, effect: PaymentEffect) -> Result<Option<Account>> {
    let email   = email.to_owned();
    let now_str = encode_dt(Utc::now());

    let raw: Option<RawAccount> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let updated = tx.execute(
          "UPDATE accounts SET is_paying = ?2 WHERE email = ?1",
          rusqlite::params![email, effect.is_paying],
        )?;
        if updated == 0 {
          if !effect.create_if_missing {
            return Ok(None);
          }
          tx.execute(
            "INSERT INTO accounts (subject_id, email, is_paying, created_at)
             VALUES (NULL, ?1, ?2, ?3)",
            rusqlite::params![email, effect.is_paying, now_str],
          )?;
        }

        let raw = account_by_email(&tx, &email)?.map(|(_, raw)| raw);
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.map(RawAccount::into_account).transpose()
  }

  // ── Block patterns ────────────────────────────────────────────────────────

  async fn list_patterns(&self, subject_id: &str) -> Result<Vec<BlockPattern>> {
    let subject_id = subject_id.to_owned();

    let raws: Vec<RawPattern> = self
      .conn
      .call(move |conn| Ok(select_patterns(conn, &subject_id)?))
      .await?;

    raws.into_iter().map(RawPattern::into_pattern).collect()
  }

  async fn sync_patterns(
    &self,
    subject_id: &str,
    submitted:  Vec<BlockPattern>,
  ) -> Result<Vec<BlockPattern>> {
    let subject_id = subject_id.to_owned();

    let raws: Vec<RawPattern> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let stored: Vec<(i64, String)> = {
          let mut stmt = tx.prepare(
            "SELECT pattern_id, pattern FROM block_patterns
             WHERE subject_id = ?1 ORDER BY pattern_id",
          )?;
          stmt
            .query_map(rusqlite::params![subject_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        let plan = plan_sync(stored.iter().map(|(id, p)| (*id, p.as_str())), &submitted);

        for chunk in plan.to_remove.chunks(DELETE_BATCH) {
          let placeholders = vec!["?"; chunk.len()].join(", ");
          let sql = format!(
            "DELETE FROM block_patterns WHERE subject_id = ? AND pattern_id IN ({placeholders})"
          );
          let params = std::iter::once(Value::Text(subject_id.clone()))
            .chain(chunk.iter().map(|id| Value::Integer(*id)));
          tx.execute(&sql, rusqlite::params_from_iter(params))?;
        }

        {
          let mut insert = tx.prepare(
            "INSERT INTO block_patterns (subject_id, pattern, created_at) VALUES (?1, ?2, ?3)",
          )?;
          for pattern in &plan.to_add {
            insert.execute(rusqlite::params![
              subject_id,
              pattern.pattern,
              encode_dt(pattern.created_at),
            ])?;
          }
        }

        tx.commit()?;
        tracing::debug!(
          %subject_id,
          added = plan.to_add.len(),
          removed = plan.to_remove.len(),
          "blocklist synced"
        );

        Ok(select_patterns(conn, &subject_id)?)
      })
      .await?;

    raws.into_iter().map(RawPattern::into_pattern).collect()
  }

  // ── Blocking history ──────────────────────────────────────────────────────

  async fn history(&self, subject_id: &str) -> Result<Vec<HistoryEntry>> {
    let subject_id = subject_id.to_owned();

    let raws: Vec<RawHistoryEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT url, pattern, timestamp FROM history_entries
           WHERE subject_id = ?1 ORDER BY timestamp",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![subject_id], |row| {
            Ok(RawHistoryEntry {
              url:       row.get(0)?,
              pattern:   row.get(1)?,
              timestamp: row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawHistoryEntry::into_entry).collect()
  }

  async fn merge_history(
    &self,
    subject_id: &str,
    entries:    Vec<HistoryEntry>,
  ) -> Result<Vec<MergedEntry>> {
    let subject_id = subject_id.to_owned();
    let entries    = collapse_by_timestamp(entries);

    let merged = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut merged = Vec::new();

        {
          let mut select = tx.prepare(
            "SELECT url, pattern FROM history_entries WHERE subject_id = ?1 AND timestamp = ?2",
          )?;
          let mut insert = tx.prepare(
            "INSERT INTO history_entries (subject_id, url, pattern, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
          )?;
          let mut update = tx.prepare(
            "UPDATE history_entries SET url = ?3, pattern = ?4
             WHERE subject_id = ?1 AND timestamp = ?2",
          )?;

          for entry in entries {
            let ts = encode_dt(entry.timestamp);
            let existing: Option<(String, String)> = select
              .query_row(rusqlite::params![subject_id, ts], |row| Ok((row.get(0)?, row.get(1)?)))
              .optional()?;

            let Some(action) =
              merge_action(existing.as_ref().map(|(u, p)| (u.as_str(), p.as_str())), &entry)
            else {
              continue;
            };

            match action {
              MergeAction::Created => {
                insert.execute(rusqlite::params![subject_id, entry.url, entry.pattern, ts])?
              }
              MergeAction::Updated => {
                update.execute(rusqlite::params![subject_id, ts, entry.url, entry.pattern])?
              }
            };
            merged.push(MergedEntry { entry, action });
          }
        }

        tx.commit()?;
        Ok(merged)
      })
      .await?;

    Ok(merged)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn stats(&self, subject_id: &str) -> Result<Stats> {
    let subject_id = subject_id.to_owned();

    let raw: RawStats = self
      .conn
      .call(move |conn| {
        // One read transaction so the totals and both breakdowns agree.
        let tx = conn.transaction()?;

        let (total, last_updated): (i64, Option<String>) = tx.query_row(
          "SELECT COUNT(*), MAX(timestamp) FROM history_entries WHERE subject_id = ?1",
          rusqlite::params![subject_id],
          |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let daily = {
          let mut stmt = tx.prepare(
            "SELECT substr(timestamp, 1, 10) AS day, COUNT(*) FROM history_entries
             WHERE subject_id = ?1 GROUP BY day ORDER BY day",
          )?;
          stmt
            .query_map(rusqlite::params![subject_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        let by_pattern = {
          let mut stmt = tx.prepare(
            "SELECT pattern, COUNT(*) FROM history_entries
             WHERE subject_id = ?1 GROUP BY pattern ORDER BY pattern",
          )?;
          stmt
            .query_map(rusqlite::params![subject_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        tx.commit()?;
        Ok(RawStats { total, last_updated, daily, by_pattern })
      })
      .await?;

    raw.into_stats()
  }
}

fn select_patterns(conn: &rusqlite::Connection, subject_id: &str) -> rusqlite::Result<Vec<RawPattern>> {
  let mut stmt = conn.prepare(
    "SELECT pattern, created_at FROM block_patterns
     WHERE subject_id = ?1 ORDER BY created_at, pattern_id",
  )?;
  stmt
    .query_map(rusqlite::params![subject_id], |row| {
      Ok(RawPattern {
        pattern:    row.get(0)?,
        created_at: row.get(1)?,
      })
    })?
    .collect()
}
