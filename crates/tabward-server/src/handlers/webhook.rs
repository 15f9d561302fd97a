//! Payment-provider webhook.

use axum::{Json, extract::State, http::HeaderMap};
use bytes::Bytes;
use serde::Serialize;
use tabward_core::store::AccountStore;

use crate::{
  AppState,
  error::Error,
  identity::IdentityProvider,
  payments::{
    PaymentProvider,
    event::{self, WebhookEvent},
    resolve_email,
  },
};

#[derive(Debug, Serialize)]
pub struct WebhookAck {
  pub success: bool,
  #[serde(skip_serializing_if = "std::ops::Not::not")]
  pub ignored: bool,
}

/// `POST /api/stripe/webhook`
pub async fn handler<S, I, P>(
  State(state): State<AppState<S, I, P>>,
  headers: HeaderMap,
  body: Bytes,
) -> Result<Json<WebhookAck>, Error>
where
  S: AccountStore,
  I: IdentityProvider,
  P: PaymentProvider,
{
  let signature = headers
    .get("stripe-signature")
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::Unauthorized)?;
  state.webhooks.verify(signature, &body, chrono::Utc::now().timestamp()).map_err(|e| {
    tracing::warn!(error = %e, "rejected webhook delivery");
    Error::Unauthorized
  })?;

  let (kind, source) = match event::decode(&body)? {
    WebhookEvent::Relevant { kind, email } => (kind, email),
    WebhookEvent::Ignored { event_type } => {
      tracing::debug!(%event_type, "ignoring webhook event");
      return Ok(Json(WebhookAck { success: true, ignored: true }));
    }
  };

  let email = resolve_email(&*state.payments, source).await?;
  let effect = kind.effect();
  let account = state.store.apply_payment(&email, effect).await.map_err(Error::store)?;

  match account {
    Some(account) => {
      tracing::info!(?kind, %email, is_paying = account.is_paying, "applied payment event");
    }
    None => tracing::info!(?kind, %email, "payment event for unknown account; nothing to update"),
  }
  Ok(Json(WebhookAck { success: true, ignored: false }))
}
