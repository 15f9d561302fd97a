//! Block-pattern endpoints.

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use tabward_core::{blocklist::BlockPattern, store::AccountStore};

use super::json_body;
use crate::{
  AppState,
  auth::CurrentUser,
  error::Error,
  identity::IdentityProvider,
  payments::PaymentProvider,
};

#[derive(Deserialize)]
pub struct PatternBody {
  pub pattern:    String,
  #[serde(alias = "createdAt")]
  pub created_at: String,
}

/// A sync submission: either a bare list or `{"patterns": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum SyncBody {
  List(Vec<PatternBody>),
  Envelope { patterns: Vec<PatternBody> },
}

impl SyncBody {
  fn into_patterns(self) -> Vec<PatternBody> {
    match self {
      SyncBody::List(patterns) | SyncBody::Envelope { patterns } => patterns,
    }
  }
}

#[derive(Serialize)]
pub struct SyncResponse {
  pub success:          bool,
  pub blocked_patterns: Vec<BlockPattern>,
}

/// `GET /api/user/blocklist`
pub async fn list<S, I, P>(
  State(state): State<AppState<S, I, P>>,
  user: CurrentUser,
) -> Result<Json<Vec<BlockPattern>>, Error>
where
  S: AccountStore,
  I: IdentityProvider,
  P: PaymentProvider,
{
  let patterns = state.store.list_patterns(&user.identity.subject_id).await.map_err(Error::store)?;
  Ok(Json(patterns))
}

/// `POST /api/user/blocklist/sync`
pub async fn sync<S, I, P>(
  State(state): State<AppState<S, I, P>>,
  user: CurrentUser,
  body: Result<Json<SyncBody>, JsonRejection>,
) -> Result<Json<SyncResponse>, Error>
where
  S: AccountStore,
  I: IdentityProvider,
  P: PaymentProvider,
{
  let submitted = json_body(body)?
    .into_patterns()
    .iter()
    .map(|p| BlockPattern::parse(&p.pattern, &p.created_at))
    .collect::<Result<Vec<_>, _>>()?;

  let subject_id = &user.identity.subject_id;
  let submitted_count = submitted.len();
  let blocked_patterns = state.store.sync_patterns(subject_id, submitted).await.map_err(Error::store)?;
  tracing::info!(%subject_id, submitted = submitted_count, stored = blocked_patterns.len(), "synced blocklist");

  Ok(Json(SyncResponse { success: true, blocked_patterns }))
}
