//! Error types and axum `IntoResponse` implementation.
//!
//! Every error body is JSON of the form `{"detail": "<message>"}`.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized")]
  Unauthorized,
  #[error("bad request: {0}")]
  BadRequest(String),
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Error::Store(Box::new(e))
  }
}

impl From<tabward_core::Error> for Error {
  fn from(e: tabward_core::Error) -> Self { Error::BadRequest(e.to_string()) }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let (status, detail) = match &self {
      Error::Unauthorized => (StatusCode::UNAUTHORIZED, "Could not validate credentials".to_owned()),
      Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
      Error::Store(e) => {
        tracing::error!(error = %e, "storage operation failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "storage failure".to_owned())
      }
    };

    let mut res = (status, Json(json!({ "detail": detail }))).into_response();
    if status == StatusCode::UNAUTHORIZED {
      res.headers_mut().insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }
    res
  }
}

/// A failed call to an external provider.
///
/// These never reach the client directly; handlers map them to
/// [`Error::Unauthorized`] or [`Error::BadRequest`] and log the detail.
#[derive(Debug, Error)]
pub enum UpstreamError {
  #[error("transport error: {0}")]
  Transport(#[from] reqwest::Error),
  #[error("upstream returned {status}: {message}")]
  Status { status: u16, message: String },
  #[error("unexpected upstream response: {0}")]
  Unexpected(String),
}

#[cfg(test)]
mod tests {
  use super::*;

  async fn body_json(res: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  #[tokio::test]
  async fn unauthorized_carries_bearer_challenge() {
    let res = Error::Unauthorized.into_response();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.headers()[header::WWW_AUTHENTICATE], "Bearer");
    assert!(body_json(res).await["detail"].is_string());
  }

  #[tokio::test]
  async fn core_errors_become_bad_requests() {
    let err: Error = tabward_core::Error::InvalidInput("pattern must not be empty".into()).into();
    let res = err.into_response();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(res.headers().get(header::WWW_AUTHENTICATE).is_none());
    let body = body_json(res).await;
    assert!(body["detail"].as_str().unwrap().contains("pattern must not be empty"));
  }

  #[tokio::test]
  async fn store_errors_do_not_leak_detail() {
    let err = Error::store(std::io::Error::other("disk I/O error at page 7"));
    let res = err.into_response();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(res).await["detail"], "storage failure");
  }
}
