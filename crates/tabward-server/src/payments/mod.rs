//! The payment provider: webhook authenticity, event decoding, and the
//! secondary lookups used when an event does not carry an email.

pub mod event;
pub mod signature;

use std::{future::Future, time::Duration};

use reqwest::Client;
use serde::Deserialize;

use crate::{config::PaymentConfig, error::{Error, UpstreamError}};
use event::EmailSource;

pub trait PaymentProvider: Send + Sync + 'static {
  /// Email recorded on a checkout session.
  fn checkout_session_email<'a>(
    &'a self,
    session_id: &'a str,
  ) -> impl Future<Output = Result<Option<String>, UpstreamError>> + Send + 'a;

  /// Email recorded on a customer.
  fn customer_email<'a>(
    &'a self,
    customer_id: &'a str,
  ) -> impl Future<Output = Result<Option<String>, UpstreamError>> + Send + 'a;
}

/// Turn an [`EmailSource`] into an address, calling the provider if needed.
///
/// Lookup failures are logged and reported as a bad request without the
/// upstream detail.
pub async fn resolve_email<P: PaymentProvider>(provider: &P, source: EmailSource) -> Result<String, Error> {
  let looked_up = match &source {
    EmailSource::Known(email) => return Ok(email.clone()),
    EmailSource::CheckoutSession(id) => provider.checkout_session_email(id).await,
    EmailSource::Customer(id) => provider.customer_email(id).await,
  };

  let email = looked_up.map_err(|e| {
    tracing::warn!(error = %e, source = ?source, "payment provider lookup failed");
    Error::BadRequest("could not resolve customer email".to_owned())
  })?;

  email
    .filter(|e| !e.trim().is_empty())
    .ok_or_else(|| Error::BadRequest("no email associated with the event".to_owned()))
}

// ─── Stripe client ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct SessionResponse {
  #[serde(default)]
  customer_details: Option<DetailsResponse>,
  #[serde(default)]
  customer_email:   Option<String>,
}

#[derive(Deserialize)]
struct DetailsResponse {
  #[serde(default)]
  email: Option<String>,
}

#[derive(Deserialize)]
struct CustomerResponse {
  #[serde(default)]
  email: Option<String>,
}

/// [`PaymentProvider`] backed by the Stripe REST API.
#[derive(Clone)]
pub struct StripeClient {
  http:       Client,
  api_base:   String,
  secret_key: String,
}

impl StripeClient {
  pub fn new(config: &PaymentConfig) -> Result<Self, UpstreamError> {
    let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
    Ok(Self {
      http,
      api_base: config.api_base.trim_end_matches('/').to_owned(),
      secret_key: config.secret_key.clone(),
    })
  }

  async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, UpstreamError> {
    let resp = self
      .http
      .get(format!("{}/v1{path}", self.api_base))
      .bearer_auth(&self.secret_key)
      .send()
      .await?;
    let status = resp.status();
    if !status.is_success() {
      let message = resp.text().await.unwrap_or_default();
      return Err(UpstreamError::Status { status: status.as_u16(), message });
    }
    let body = resp.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| UpstreamError::Unexpected(e.to_string()))
  }
}

impl PaymentProvider for StripeClient {
  async fn checkout_session_email(&self, session_id: &str) -> Result<Option<String>, UpstreamError> {
    let session: SessionResponse = self.get(&format!("/checkout/sessions/{session_id}")).await?;
    Ok(session.customer_details.and_then(|d| d.email).or(session.customer_email))
  }

  async fn customer_email(&self, customer_id: &str) -> Result<Option<String>, UpstreamError> {
    let customer: CustomerResponse = self.get(&format!("/customers/{customer_id}")).await?;
    Ok(customer.email)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::FakePayments;

  #[tokio::test]
  async fn known_email_skips_lookup() {
    let provider = FakePayments::default();
    let email = resolve_email(&provider, EmailSource::Known("a@b.com".into())).await.unwrap();
    assert_eq!(email, "a@b.com");
    assert_eq!(provider.lookups(), 0);
  }

  #[tokio::test]
  async fn customer_lookup_resolves() {
    let provider = FakePayments::default().with_customer("cus_1", "a@b.com");
    let email = resolve_email(&provider, EmailSource::Customer("cus_1".into())).await.unwrap();
    assert_eq!(email, "a@b.com");
  }

  #[tokio::test]
  async fn lookup_failure_is_a_bad_request() {
    let provider = FakePayments::default();
    let err = resolve_email(&provider, EmailSource::CheckoutSession("cs_missing".into())).await.unwrap_err();
    match err {
      Error::BadRequest(msg) => assert!(!msg.contains("cs_missing"), "{msg}"),
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[tokio::test]
  async fn customer_without_email_is_a_bad_request() {
    let provider = FakePayments::default().with_customer("cus_1", "");
    let err = resolve_email(&provider, EmailSource::Customer("cus_1".into())).await.unwrap_err();
    assert!(matches!(err, Error::BadRequest(_)));
  }
}
