//! Runtime configuration, deserialised from `config.toml` layered under
//! `TABWARD_*` environment variables.

use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:          String,
  #[serde(default = "default_port")]
  pub port:          u16,
  pub database_path: PathBuf,
  pub identity:      IdentityConfig,
  pub payments:      PaymentConfig,
}

/// Connection settings for the hosted identity provider.
#[derive(Deserialize, Clone)]
pub struct IdentityConfig {
  /// Project URL, e.g. `https://xyz.supabase.co`.
  pub auth_url:   String,
  pub anon_key:   String,
  /// HS256 secret the provider signs access tokens with.
  pub jwt_secret: String,
  /// Expected `aud` claim, `authenticated` when unset. An empty string
  /// disables audience validation.
  #[serde(default = "default_audience")]
  pub audience:   Option<String>,
}

/// Connection settings for the payment provider.
#[derive(Deserialize, Clone)]
pub struct PaymentConfig {
  #[serde(default = "default_api_base")]
  pub api_base:       String,
  pub secret_key:     String,
  pub webhook_secret: String,
  /// Maximum accepted age of a webhook signature, in seconds.
  #[serde(default = "default_tolerance")]
  pub tolerance_secs: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
  #[error("configuration value `{0}` must not be empty")]
  Empty(&'static str),
  #[error("configuration value `{0}` must be positive")]
  NotPositive(&'static str),
}

fn default_host() -> String { "127.0.0.1".to_owned() }
fn default_port() -> u16 { 8000 }
fn default_audience() -> Option<String> { Some("authenticated".to_owned()) }
fn default_api_base() -> String { "https://api.stripe.com".to_owned() }
fn default_tolerance() -> i64 { 300 }

impl ServerConfig {
  /// Reject configurations the server cannot run with.
  pub fn validate(&self) -> Result<(), ConfigError> {
    let required = [
      ("database_path", self.database_path.as_os_str().is_empty()),
      ("identity.auth_url", self.identity.auth_url.trim().is_empty()),
      ("identity.anon_key", self.identity.anon_key.trim().is_empty()),
      ("identity.jwt_secret", self.identity.jwt_secret.is_empty()),
      ("payments.api_base", self.payments.api_base.trim().is_empty()),
      ("payments.secret_key", self.payments.secret_key.trim().is_empty()),
      ("payments.webhook_secret", self.payments.webhook_secret.is_empty()),
    ];
    if let Some((name, _)) = required.into_iter().find(|(_, empty)| *empty) {
      return Err(ConfigError::Empty(name));
    }
    if self.payments.tolerance_secs <= 0 {
      return Err(ConfigError::NotPositive("payments.tolerance_secs"));
    }
    Ok(())
  }
}
