//! Error types for `tabward-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid timestamp {value:?}: {reason}")]
  InvalidTimestamp { value: String, reason: String },

  #[error("invalid input: {0}")]
  InvalidInput(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
