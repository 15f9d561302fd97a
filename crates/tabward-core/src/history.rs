//! Blocking history: the per-account log of blocked-tab events.
//!
//! The event timestamp is the natural key: a subject has at most one entry per
//! timestamp. Merging a client-held history into the store inserts new keys
//! and rewrites existing keys whose url or pattern changed.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Result, timestamp::parse_timestamp};

/// One blocked-tab event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
  pub url:       String,
  pub pattern:   String,
  pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
  pub fn parse(url: &str, pattern: &str, timestamp: &str) -> Result<Self> {
    Ok(Self {
      url:       url.to_owned(),
      pattern:   pattern.to_owned(),
      timestamp: parse_timestamp(timestamp)?,
    })
  }

  /// `true` when `self` and `other` carry the same url and pattern.
  pub fn same_content(&self, url: &str, pattern: &str) -> bool {
    self.url == url && self.pattern == pattern
  }
}

/// What a merge did to a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeAction {
  Created,
  Updated,
}

/// An entry written by a merge, tagged with the write it caused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedEntry {
  #[serde(flatten)]
  pub entry:  HistoryEntry,
  pub action: MergeAction,
}

/// Collapse entries that share a timestamp, keeping the one submitted last.
///
/// The result is ordered by timestamp.
// NOTE: the key is the timestamp itself, so "latest timestamp wins" among
// colliding entries reduces to submission order. Whether the intended key is
// really the url is an open product question.
pub fn collapse_by_timestamp(entries: Vec<HistoryEntry>) -> Vec<HistoryEntry> {
  let mut by_key: BTreeMap<DateTime<Utc>, HistoryEntry> = BTreeMap::new();
  for entry in entries {
    by_key.insert(entry.timestamp, entry);
  }
  by_key.into_values().collect()
}

/// Decide the write needed for `incoming`, given the stored `(url, pattern)`
/// at the same key, if any. `None` means the stored row is already current.
pub fn merge_action(existing: Option<(&str, &str)>, incoming: &HistoryEntry) -> Option<MergeAction> {
  match existing {
    None => Some(MergeAction::Created),
    Some((url, pattern)) if incoming.same_content(url, pattern) => None,
    Some(_) => Some(MergeAction::Updated),
  }
}
