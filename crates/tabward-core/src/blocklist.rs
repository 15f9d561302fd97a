//! Block patterns and the full-set reconciliation plan.
//!
//! A sync call replaces the stored pattern set with the client's submission.
//! [`plan_sync`] computes the minimal set of inserts and deletes that gets the
//! store there; the backend executes the plan inside one transaction.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, timestamp::parse_timestamp};

/// A URL pattern the user wants blocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPattern {
  pub pattern:    String,
  pub created_at: DateTime<Utc>,
}

impl BlockPattern {
  /// Build a pattern from the wire representation, rejecting empty pattern
  /// text and malformed timestamps.
  pub fn parse(pattern: &str, created_at: &str) -> Result<Self> {
    let pattern = pattern.trim();
    if pattern.is_empty() {
      return Err(Error::InvalidInput("pattern must not be empty".to_owned()));
    }
    Ok(Self {
      pattern:    pattern.to_owned(),
      created_at: parse_timestamp(created_at)?,
    })
  }
}

/// Store operations that turn the stored set into the submitted set.
///
/// `K` is the backend's row key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan<K> {
  pub to_add:    Vec<BlockPattern>,
  pub to_remove: Vec<K>,
}

impl<K> SyncPlan<K> {
  pub fn is_noop(&self) -> bool { self.to_add.is_empty() && self.to_remove.is_empty() }
}

/// Diff the stored rows against a full-set submission, by pattern text only.
///
/// - Submitted patterns not yet stored are added, keeping the first occurrence
///   (and its `created_at`) when the submission repeats a pattern.
/// - Stored rows whose pattern is not submitted are removed.
/// - When the store holds several rows for one submitted pattern, all but the
///   first are removed, so the stored set is duplicate-free afterwards.
pub fn plan_sync<'a, K>(
  stored: impl IntoIterator<Item = (K, &'a str)>,
  submitted: &[BlockPattern],
) -> SyncPlan<K> {
  let wanted: HashSet<&str> = submitted.iter().map(|p| p.pattern.as_str()).collect();

  let mut kept: HashSet<&str> = HashSet::new();
  let mut to_remove = Vec::new();
  for (key, pattern) in stored {
    if wanted.contains(pattern) && kept.insert(pattern) {
      continue;
    }
    to_remove.push(key);
  }

  let mut to_add = Vec::new();
  for pattern in submitted {
    if kept.insert(pattern.pattern.as_str()) {
      to_add.push(pattern.clone());
    }
  }

  SyncPlan { to_add, to_remove }
}
