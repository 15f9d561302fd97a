//! Blocking-history endpoints.

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
};
use serde::Deserialize;
use tabward_core::{
  history::{HistoryEntry, MergedEntry},
  store::AccountStore,
};

use super::json_body;
use crate::{
  AppState,
  auth::CurrentUser,
  error::Error,
  identity::IdentityProvider,
  payments::PaymentProvider,
};

#[derive(Deserialize)]
pub struct EntryBody {
  pub url:       String,
  pub pattern:   String,
  pub timestamp: String,
}

/// A merge submission: either a bare list or `{"blocking_history": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum MergeBody {
  List(Vec<EntryBody>),
  Envelope { blocking_history: Vec<EntryBody> },
}

/// `GET /api/user/blocking_history`
pub async fn list<S, I, P>(
  State(state): State<AppState<S, I, P>>,
  user: CurrentUser,
) -> Result<Json<Vec<HistoryEntry>>, Error>
where
  S: AccountStore,
  I: IdentityProvider,
  P: PaymentProvider,
{
  let entries = state.store.history(&user.identity.subject_id).await.map_err(Error::store)?;
  Ok(Json(entries))
}

/// `POST /api/user/blocking_history`
pub async fn merge<S, I, P>(
  State(state): State<AppState<S, I, P>>,
  user: CurrentUser,
  body: Result<Json<MergeBody>, JsonRejection>,
) -> Result<Json<Vec<MergedEntry>>, Error>
where
  S: AccountStore,
  I: IdentityProvider,
  P: PaymentProvider,
{
  let raw = match json_body(body)? {
    MergeBody::List(entries) | MergeBody::Envelope { blocking_history: entries } => entries,
  };
  let entries = raw
    .iter()
    .map(|e| HistoryEntry::parse(&e.url, &e.pattern, &e.timestamp))
    .collect::<Result<Vec<_>, _>>()?;

  let subject_id = &user.identity.subject_id;
  let merged = state.store.merge_history(subject_id, entries).await.map_err(Error::store)?;
  tracing::info!(%subject_id, submitted = raw.len(), written = merged.len(), "merged blocking history");

  Ok(Json(merged))
}
