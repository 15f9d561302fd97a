//! HTTP layer for Tabward.
//!
//! Exposes an axum [`Router`] serving the browser extension's `/api` surface,
//! backed by any [`AccountStore`], [`IdentityProvider`] and
//! [`PaymentProvider`].

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod payments;

#[cfg(test)]
mod testing;

pub use config::ServerConfig;
pub use error::Error;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use tabward_core::store::AccountStore;
use tower_http::trace::TraceLayer;

use auth::TokenVerifier;
use handlers::{auth as auth_routes, blocklist, health, history, stats, webhook};
use identity::IdentityProvider;
use payments::{PaymentProvider, signature::WebhookVerifier};

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, I, P> {
  pub store:    Arc<S>,
  pub identity: Arc<I>,
  pub payments: Arc<P>,
  pub tokens:   Arc<TokenVerifier>,
  pub webhooks: Arc<WebhookVerifier>,
}

impl<S, I, P> AppState<S, I, P> {
  pub fn new(
    store: S,
    identity: I,
    payments: P,
    tokens: TokenVerifier,
    webhooks: WebhookVerifier,
  ) -> Self {
    Self {
      store:    Arc::new(store),
      identity: Arc::new(identity),
      payments: Arc::new(payments),
      tokens:   Arc::new(tokens),
      webhooks: Arc::new(webhooks),
    }
  }
}

impl<S, I, P> Clone for AppState<S, I, P> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      identity: Arc::clone(&self.identity),
      payments: Arc::clone(&self.payments),
      tokens:   Arc::clone(&self.tokens),
      webhooks: Arc::clone(&self.webhooks),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the whole service.
pub fn router<S, I, P>(state: AppState<S, I, P>) -> Router
where
  S: AccountStore,
  I: IdentityProvider,
  P: PaymentProvider,
{
  Router::new()
    .route("/api/health/check",          get(health::check))
    // Auth
    .route("/api/auth/register",         post(auth_routes::register::<S, I, P>))
    .route("/api/auth/login",            post(auth_routes::login::<S, I, P>))
    .route("/api/auth/session",          get(auth_routes::session))
    .route("/api/auth/logout",           post(auth_routes::logout::<S, I, P>))
    .route("/api/auth/refresh",          post(auth_routes::refresh::<S, I, P>))
    // Per-user data
    .route("/api/user/blocklist",        get(blocklist::list::<S, I, P>))
    .route("/api/user/blocklist/sync",   post(blocklist::sync::<S, I, P>))
    .route("/api/user/blocking_history", get(history::list::<S, I, P>).post(history::merge::<S, I, P>))
    .route("/api/user/stats",            get(stats::get::<S, I, P>))
    // Payments
    .route("/api/stripe/webhook",        post(webhook::handler::<S, I, P>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
