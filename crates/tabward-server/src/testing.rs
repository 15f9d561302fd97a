//! In-process identity and payment providers for tests.

use std::{
  collections::HashMap,
  sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
  },
};

use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::json;
use tabward_store_sqlite::SqliteStore;

use crate::{
  AppState,
  auth::TokenVerifier,
  config::IdentityConfig,
  error::UpstreamError,
  identity::{IdentityProvider, ProviderUser, SignUpOutcome, TokenPair},
  payments::{PaymentProvider, signature::WebhookVerifier},
};

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const WEBHOOK_SECRET: &str = "whsec_test";

pub fn identity_config() -> IdentityConfig {
  IdentityConfig {
    auth_url:   "http://identity.invalid".into(),
    anon_key:   "anon".into(),
    jwt_secret: JWT_SECRET.into(),
    audience:   Some("authenticated".into()),
  }
}

pub fn mint_with(sub: &str, email: &str, expires_in: i64, aud: &str, secret: &str) -> String {
  let exp = chrono::Utc::now().timestamp() + expires_in;
  let claims = json!({ "sub": sub, "email": email, "aud": aud, "exp": exp, "role": "authenticated" });
  encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
}

/// A valid access token for `sub`, not yet known to any provider.
pub fn mint(sub: &str, email: &str) -> String {
  mint_with(sub, email, 3600, "authenticated", JWT_SECRET)
}

fn upstream(status: u16, message: &str) -> UpstreamError {
  UpstreamError::Status { status, message: message.to_owned() }
}

// ─── Identity ────────────────────────────────────────────────────────────────

#[derive(Default)]
struct IdentityInner {
  /// access token -> user
  sessions:  HashMap<String, ProviderUser>,
  /// refresh token -> user
  refreshes: HashMap<String, ProviderUser>,
  /// email -> (password, subject id)
  accounts:  HashMap<String, (String, String)>,
}

#[derive(Default)]
pub struct FakeIdentity {
  inner:           Mutex<IdentityInner>,
  /// When set, sign-ups wait for email confirmation instead of opening a session.
  require_confirm: bool,
  issued:          AtomicUsize,
}

impl FakeIdentity {
  pub fn confirming() -> Self { Self { require_confirm: true, ..Self::default() } }

  /// Record `token` as a live session for `sub`.
  pub fn register(&self, token: &str, sub: &str, email: &str) {
    let user = ProviderUser {
      id:    sub.to_owned(),
      email: Some(email.to_owned()).filter(|e| !e.is_empty()),
    };
    self.inner.lock().unwrap().sessions.insert(token.to_owned(), user);
  }

  /// Mint and register a session for `sub`.
  pub fn issue(&self, sub: &str, email: &str) -> String {
    let token = mint(sub, email);
    self.register(&token, sub, email);
    token
  }

  fn open_session(&self, sub: &str, email: &str) -> TokenPair {
    let n = self.issued.fetch_add(1, Ordering::SeqCst);
    let access_token = self.issue(sub, email);
    let refresh_token = format!("refresh-{sub}-{n}");
    let user = ProviderUser { id: sub.to_owned(), email: Some(email.to_owned()) };
    self.inner.lock().unwrap().refreshes.insert(refresh_token.clone(), user);
    TokenPair { access_token, refresh_token, expires_in: 3600, token_type: "bearer".into() }
  }

  pub fn add_account(&self, email: &str, password: &str, sub: &str) {
    let mut inner = self.inner.lock().unwrap();
    inner.accounts.insert(email.to_owned(), (password.to_owned(), sub.to_owned()));
  }
}

impl IdentityProvider for FakeIdentity {
  async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, UpstreamError> {
    let sub = {
      let mut inner = self.inner.lock().unwrap();
      if inner.accounts.contains_key(email) {
        return Err(upstream(422, "User already registered"));
      }
      let sub = format!("sub-{}", inner.accounts.len() + 1);
      inner.accounts.insert(email.to_owned(), (password.to_owned(), sub.clone()));
      sub
    };
    if self.require_confirm {
      return Ok(SignUpOutcome::PendingVerification(ProviderUser {
        id:    sub,
        email: Some(email.to_owned()),
      }));
    }
    Ok(SignUpOutcome::Session(self.open_session(&sub, email)))
  }

  async fn sign_in(&self, email: &str, password: &str) -> Result<TokenPair, UpstreamError> {
    let sub = {
      let inner = self.inner.lock().unwrap();
      match inner.accounts.get(email) {
        Some((stored, sub)) if stored == password => sub.clone(),
        _ => return Err(upstream(400, "Invalid login credentials")),
      }
    };
    Ok(self.open_session(&sub, email))
  }

  async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, UpstreamError> {
    let user = self.inner.lock().unwrap().refreshes.remove(refresh_token);
    let user = user.ok_or_else(|| upstream(400, "Invalid Refresh Token"))?;
    Ok(self.open_session(&user.id, user.email.as_deref().unwrap_or_default()))
  }

  async fn sign_out(&self, access_token: &str) -> Result<(), UpstreamError> {
    self.inner.lock().unwrap().sessions.remove(access_token);
    Ok(())
  }

  async fn user(&self, access_token: &str) -> Result<ProviderUser, UpstreamError> {
    let user = self.inner.lock().unwrap().sessions.get(access_token).cloned();
    user.ok_or_else(|| upstream(401, "invalid JWT"))
  }
}

// ─── Payments ────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakePayments {
  sessions:  HashMap<String, String>,
  customers: HashMap<String, String>,
  lookups:   AtomicUsize,
}

impl FakePayments {
  pub fn with_session(mut self, id: &str, email: &str) -> Self {
    self.sessions.insert(id.to_owned(), email.to_owned());
    self
  }

  pub fn with_customer(mut self, id: &str, email: &str) -> Self {
    self.customers.insert(id.to_owned(), email.to_owned());
    self
  }

  pub fn lookups(&self) -> usize { self.lookups.load(Ordering::SeqCst) }
}

impl PaymentProvider for FakePayments {
  async fn checkout_session_email(&self, session_id: &str) -> Result<Option<String>, UpstreamError> {
    self.lookups.fetch_add(1, Ordering::SeqCst);
    match self.sessions.get(session_id) {
      Some(email) => Ok(Some(email.clone()).filter(|e| !e.is_empty())),
      None => Err(upstream(404, &format!("No such checkout.session: {session_id}"))),
    }
  }

  async fn customer_email(&self, customer_id: &str) -> Result<Option<String>, UpstreamError> {
    self.lookups.fetch_add(1, Ordering::SeqCst);
    match self.customers.get(customer_id) {
      Some(email) => Ok(Some(email.clone()).filter(|e| !e.is_empty())),
      None => Err(upstream(404, &format!("No such customer: {customer_id}"))),
    }
  }
}

// ─── State ───────────────────────────────────────────────────────────────────

pub type TestState = AppState<SqliteStore, FakeIdentity, FakePayments>;

pub async fn make_state(identity: FakeIdentity, payments: FakePayments) -> TestState {
  let store = SqliteStore::open_in_memory().await.unwrap();
  AppState::new(
    store,
    identity,
    payments,
    TokenVerifier::new(&identity_config()),
    WebhookVerifier::new(WEBHOOK_SECRET, 300).unwrap(),
  )
}
