//! Usage statistics, in the wire shape the extension renders.

use axum::{Json, extract::State};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tabward_core::{stats::Stats, store::AccountStore};

use crate::{
  AppState,
  auth::CurrentUser,
  error::Error,
  identity::IdentityProvider,
  payments::PaymentProvider,
};

#[derive(Debug, Serialize)]
pub struct StatsResponse {
  pub user_stats:            UserStats,
  pub daily_stats:           Vec<DailyStat>,
  pub blocked_pattern_stats: Vec<PatternStat>,
}

#[derive(Debug, Serialize)]
pub struct UserStats {
  pub total_tabs_blocked: u64,
  pub last_updated:       Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct DailyStat {
  pub date:         NaiveDate,
  pub tabs_blocked: u64,
}

#[derive(Debug, Serialize)]
pub struct PatternStat {
  pub pattern: String,
  pub count:   u64,
}

impl From<Stats> for StatsResponse {
  fn from(stats: Stats) -> Self {
    StatsResponse {
      user_stats:            UserStats {
        total_tabs_blocked: stats.total_blocked,
        last_updated:       stats.last_updated,
      },
      daily_stats:           stats
        .daily
        .into_iter()
        .map(|d| DailyStat { date: d.date, tabs_blocked: d.count })
        .collect(),
      blocked_pattern_stats: stats
        .by_pattern
        .into_iter()
        .map(|p| PatternStat { pattern: p.pattern, count: p.count })
        .collect(),
    }
  }
}

/// `GET /api/user/stats`
pub async fn get<S, I, P>(
  State(state): State<AppState<S, I, P>>,
  user: CurrentUser,
) -> Result<Json<StatsResponse>, Error>
where
  S: AccountStore,
  I: IdentityProvider,
  P: PaymentProvider,
{
  let stats = state.store.stats(&user.identity.subject_id).await.map_err(Error::store)?;
  Ok(Json(stats.into()))
}
