//! Webhook signature verification.
//!
//! The provider signs each delivery with a header of the form
//! `t=<unix seconds>,v1=<hex hmac>[,v1=<hex hmac>…]`, where each `v1` is
//! HMAC-SHA256 over `"{t}.{raw body}"` keyed by the endpoint secret. More than
//! one `v1` appears while a secret is being rolled.

use hmac::{Hmac, Mac, digest::InvalidLength};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
  #[error("malformed signature header")]
  Malformed,
  #[error("no signature matches the payload")]
  Mismatch,
  #[error("signature timestamp {timestamp} is outside the tolerance window")]
  Stale { timestamp: i64 },
}

pub struct WebhookVerifier {
  keyed:          HmacSha256,
  tolerance_secs: i64,
}

struct SignatureHeader {
  timestamp:  i64,
  signatures: Vec<Vec<u8>>,
}

fn parse_header(header: &str) -> Result<SignatureHeader, SignatureError> {
  let mut timestamp = None;
  let mut signatures = Vec::new();
  for item in header.split(',') {
    let Some((key, value)) = item.trim().split_once('=') else { continue };
    match key {
      "t" => timestamp = Some(value.parse().map_err(|_| SignatureError::Malformed)?),
      // Undecodable candidates can never match; skip them.
      "v1" => signatures.extend(hex::decode(value).ok()),
      _ => {}
    }
  }
  let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
  if signatures.is_empty() {
    return Err(SignatureError::Malformed);
  }
  Ok(SignatureHeader { timestamp, signatures })
}

impl WebhookVerifier {
  pub fn new(secret: &str, tolerance_secs: i64) -> Result<Self, InvalidLength> {
    Ok(Self { keyed: HmacSha256::new_from_slice(secret.as_bytes())?, tolerance_secs })
  }

  fn mac(&self, timestamp: i64, payload: &[u8]) -> HmacSha256 {
    let mut mac = self.keyed.clone();
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac
  }

  /// Check `header` against `payload` at time `now` (unix seconds).
  pub fn verify(&self, header: &str, payload: &[u8], now: i64) -> Result<(), SignatureError> {
    let parsed = parse_header(header)?;
    // `t` is attacker-controlled; `abs_diff` cannot overflow.
    if now.abs_diff(parsed.timestamp) > self.tolerance_secs.unsigned_abs() {
      return Err(SignatureError::Stale { timestamp: parsed.timestamp });
    }

    let mac = self.mac(parsed.timestamp, payload);
    if parsed.signatures.iter().any(|sig| mac.clone().verify_slice(sig).is_ok()) {
      Ok(())
    } else {
      Err(SignatureError::Mismatch)
    }
  }

  /// Produce a header value for `payload` signed at `timestamp`.
  #[cfg(test)]
  pub fn sign(&self, payload: &[u8], timestamp: i64) -> String {
    let digest = self.mac(timestamp, payload).finalize().into_bytes();
    format!("t={timestamp},v1={}", hex::encode(digest))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const NOW: i64 = 1_700_000_000;
  const BODY: &[u8] = br#"{"type":"checkout.session.completed"}"#;

  fn verifier() -> WebhookVerifier { WebhookVerifier::new("whsec_test", 300).unwrap() }

  #[test]
  fn fresh_signature_verifies() {
    let v = verifier();
    let header = v.sign(BODY, NOW - 10);
    assert_eq!(v.verify(&header, BODY, NOW), Ok(()));
  }

  #[test]
  fn tampered_body_is_rejected() {
    let v = verifier();
    let header = v.sign(BODY, NOW);
    assert_eq!(v.verify(&header, b"{}", NOW), Err(SignatureError::Mismatch));
  }

  #[test]
  fn other_secret_is_rejected() {
    let header = WebhookVerifier::new("whsec_other", 300).unwrap().sign(BODY, NOW);
    assert_eq!(verifier().verify(&header, BODY, NOW), Err(SignatureError::Mismatch));
  }

  #[test]
  fn tolerance_window_is_enforced() {
    let v = verifier();
    assert_eq!(v.verify(&v.sign(BODY, NOW - 300), BODY, NOW), Ok(()));
    assert_eq!(
      v.verify(&v.sign(BODY, NOW - 301), BODY, NOW),
      Err(SignatureError::Stale { timestamp: NOW - 301 })
    );
    assert!(v.verify(&v.sign(BODY, NOW + 301), BODY, NOW).is_err());
  }

  #[test]
  fn extreme_timestamps_are_stale() {
    let v = verifier();
    for t in [i64::MIN, -9_223_372_036_854_775_000, i64::MAX] {
      let header = format!("t={t},v1={}", "00".repeat(32));
      assert_eq!(v.verify(&header, BODY, NOW), Err(SignatureError::Stale { timestamp: t }), "{t}");
    }
  }

  #[test]
  fn any_matching_v1_is_accepted() {
    let v = verifier();
    let good = v.sign(BODY, NOW);
    let good_sig = good.split_once(",v1=").unwrap().1;
    let header = format!("t={NOW},v1={},v1={good_sig},v0=ignored", "00".repeat(32));
    assert_eq!(v.verify(&header, BODY, NOW), Ok(()));
  }

  #[test]
  fn malformed_headers_are_rejected() {
    let v = verifier();
    for header in ["", "garbage", "v1=abcd", "t=notanumber,v1=abcd", "t=1700000000", "t=1700000000,v1=zz"] {
      assert_eq!(v.verify(header, BODY, NOW), Err(SignatureError::Malformed), "{header:?}");
    }
  }
}
