//! The hosted identity provider: sign-up, password and refresh grants,
//! sign-out, and the live user lookup behind bearer verification.

use std::{future::Future, time::Duration};

use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;

use crate::{config::IdentityConfig, error::UpstreamError};

/// Access/refresh token pair issued by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
  pub access_token:  String,
  pub refresh_token: String,
  pub expires_in:    u64,
  pub token_type:    String,
}

/// A user as the provider reports it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderUser {
  pub id:    String,
  #[serde(default)]
  pub email: Option<String>,
}

/// What a sign-up produced.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SignUpOutcome {
  /// The account is usable immediately.
  Session(TokenPair),
  /// The provider sent a confirmation email; no session yet.
  PendingVerification(ProviderUser),
}

pub trait IdentityProvider: Send + Sync + 'static {
  fn sign_up<'a>(
    &'a self,
    email: &'a str,
    password: &'a str,
  ) -> impl Future<Output = Result<SignUpOutcome, UpstreamError>> + Send + 'a;

  fn sign_in<'a>(
    &'a self,
    email: &'a str,
    password: &'a str,
  ) -> impl Future<Output = Result<TokenPair, UpstreamError>> + Send + 'a;

  fn refresh<'a>(
    &'a self,
    refresh_token: &'a str,
  ) -> impl Future<Output = Result<TokenPair, UpstreamError>> + Send + 'a;

  /// Revoke the session behind `access_token`.
  fn sign_out<'a>(
    &'a self,
    access_token: &'a str,
  ) -> impl Future<Output = Result<(), UpstreamError>> + Send + 'a;

  /// Look up the user `access_token` belongs to.
  fn user<'a>(
    &'a self,
    access_token: &'a str,
  ) -> impl Future<Output = Result<ProviderUser, UpstreamError>> + Send + 'a;
}

// ─── GoTrue client ───────────────────────────────────────────────────────────

/// [`IdentityProvider`] backed by a Supabase (GoTrue) auth endpoint.
#[derive(Clone)]
pub struct GoTrueClient {
  http:     Client,
  base_url: String,
  anon_key: String,
}

impl GoTrueClient {
  pub fn new(config: &IdentityConfig) -> Result<Self, UpstreamError> {
    let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
    Ok(Self {
      http,
      base_url: config.auth_url.trim_end_matches('/').to_owned(),
      anon_key: config.anon_key.clone(),
    })
  }

  fn post(&self, path: &str) -> RequestBuilder {
    self.http.post(format!("{}/auth/v1{path}", self.base_url)).header("apikey", &self.anon_key)
  }

  async fn send<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, UpstreamError> {
    let resp = req.send().await?;
    let status = resp.status();
    if !status.is_success() {
      let message = resp.text().await.unwrap_or_default();
      return Err(UpstreamError::Status { status: status.as_u16(), message });
    }
    let body = resp.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| UpstreamError::Unexpected(e.to_string()))
  }
}

impl IdentityProvider for GoTrueClient {
  async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, UpstreamError> {
    let req = self.post("/signup").json(&json!({ "email": email, "password": password }));
    Self::send(req).await
  }

  async fn sign_in(&self, email: &str, password: &str) -> Result<TokenPair, UpstreamError> {
    let req = self
      .post("/token")
      .query(&[("grant_type", "password")])
      .json(&json!({ "email": email, "password": password }));
    Self::send(req).await
  }

  async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, UpstreamError> {
    let req = self
      .post("/token")
      .query(&[("grant_type", "refresh_token")])
      .json(&json!({ "refresh_token": refresh_token }));
    Self::send(req).await
  }

  async fn sign_out(&self, access_token: &str) -> Result<(), UpstreamError> {
    let resp = self.post("/logout").bearer_auth(access_token).send().await?;
    let status = resp.status();
    if status.is_success() {
      return Ok(());
    }
    let message = resp.text().await.unwrap_or_default();
    Err(UpstreamError::Status { status: status.as_u16(), message })
  }

  async fn user(&self, access_token: &str) -> Result<ProviderUser, UpstreamError> {
    let req = self
      .http
      .get(format!("{}/auth/v1/user", self.base_url))
      .header("apikey", &self.anon_key)
      .bearer_auth(access_token);
    Self::send(req).await
  }
}
