//! Usage statistics, derived on read from the blocking history.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Number of blocked tabs on one UTC calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
  pub date:  NaiveDate,
  pub count: u64,
}

/// Number of blocked tabs attributed to one pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternCount {
  pub pattern: String,
  pub count:   u64,
}

/// Aggregate view over an account's history. Never stored.
///
/// `daily` and `by_pattern` each partition the history, so their counts both
/// sum to `total_blocked`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Stats {
  pub total_blocked: u64,
  /// Latest event timestamp; `None` when there is no history.
  pub last_updated:  Option<DateTime<Utc>>,
  pub daily:         Vec<DailyCount>,
  pub by_pattern:    Vec<PatternCount>,
}
