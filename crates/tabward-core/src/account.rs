//! Accounts, one per end user.
//!
//! An account is keyed by the identity provider's stable subject id once the
//! user has logged in at least once. Before that, a payment event may create an
//! email-only account that is linked to its subject id on first login.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A verified identity, as resolved from a bearer credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
  pub subject_id: String,
  pub email:      String,
}

/// The persisted per-user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
  /// `None` until the user authenticates for the first time.
  pub subject_id: Option<String>,
  pub email:      String,
  pub is_paying:  bool,
  pub created_at: DateTime<Utc>,
}
