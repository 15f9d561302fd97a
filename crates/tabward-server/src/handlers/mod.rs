//! Route handlers, one module per resource.

pub mod auth;
pub mod blocklist;
pub mod health;
pub mod history;
pub mod stats;
pub mod webhook;

use axum::{Json, extract::rejection::JsonRejection};

use crate::error::Error;

/// Unwrap a JSON body, turning axum's rejection into a `{"detail": …}` 400.
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Error> {
  body.map(|Json(value)| value).map_err(|e| Error::BadRequest(e.body_text()))
}
