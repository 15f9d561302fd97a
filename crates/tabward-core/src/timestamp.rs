//! Parsing of client-supplied timestamps.
//!
//! Clients send ISO 8601 strings. Both offset-qualified RFC 3339 values
//! (`2024-05-01T09:30:00.123Z`) and naive date-times (`2024-05-01T09:30:00`)
//! are accepted; naive values are taken to be UTC. Every parsed value is
//! truncated to microsecond precision, which is what the store persists, so a
//! value that went through [`parse_timestamp`] compares equal to itself after
//! a round-trip through storage.

use chrono::{DateTime, NaiveDateTime, SubsecRound as _, Utc};

use crate::{Error, Result};

const NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Parse an ISO 8601 timestamp into a UTC instant with microsecond precision.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
  let trimmed = raw.trim();

  let parsed = match DateTime::parse_from_rfc3339(trimmed) {
    Ok(dt) => dt.with_timezone(&Utc),
    Err(rfc_err) => NaiveDateTime::parse_from_str(trimmed, NAIVE_FORMAT)
      .map(|naive| naive.and_utc())
      .map_err(|_| Error::InvalidTimestamp {
        value:  raw.to_owned(),
        reason: rfc_err.to_string(),
      })?,
  };

  Ok(parsed.trunc_subsecs(6))
}
