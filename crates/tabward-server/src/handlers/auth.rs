//! Account lifecycle endpoints, delegated to the identity provider.

use axum::{
  Form,
  Json,
  extract::{FromRequest, Request, State, rejection::JsonRejection},
  http::{StatusCode, header},
  response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tabward_core::store::AccountStore;

use super::json_body;
use crate::{
  AppState,
  auth::CurrentUser,
  error::Error,
  identity::{IdentityProvider, SignUpOutcome},
  payments::PaymentProvider,
};

#[derive(Deserialize)]
pub struct Credentials {
  #[serde(alias = "email")]
  pub username: String,
  pub password: String,
}

impl Credentials {
  fn validate(self) -> Result<Self, Error> {
    if self.username.trim().is_empty() || self.password.is_empty() {
      return Err(Error::BadRequest("username and password are required".to_owned()));
    }
    Ok(self)
  }
}

/// Login credentials, accepted either form-urlencoded or as JSON.
pub struct LoginForm(pub Credentials);

impl<St: Send + Sync> FromRequest<St> for LoginForm {
  type Rejection = Error;

  async fn from_request(req: Request, state: &St) -> Result<Self, Self::Rejection> {
    let is_json = req
      .headers()
      .get(header::CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .is_some_and(|ct| ct.starts_with("application/json"));

    let creds = if is_json {
      let Json(creds) = Json::<Credentials>::from_request(req, state)
        .await
        .map_err(|e| Error::BadRequest(e.body_text()))?;
      creds
    } else {
      let Form(creds) = Form::<Credentials>::from_request(req, state)
        .await
        .map_err(|e| Error::BadRequest(e.body_text()))?;
      creds
    };
    Ok(LoginForm(creds))
  }
}

#[derive(Serialize)]
pub struct RegistrationPending {
  pub message:               String,
  pub user_id:               String,
  pub email:                 String,
  pub requires_verification: bool,
}

#[derive(Serialize)]
pub struct SessionInfo {
  pub subject_id: String,
  pub email:      String,
  pub is_paying:  bool,
}

#[derive(Deserialize)]
pub struct RefreshBody {
  pub refresh_token: String,
}

/// `POST /api/auth/register`
pub async fn register<S, I, P>(
  State(state): State<AppState<S, I, P>>,
  body: Result<Json<Credentials>, JsonRejection>,
) -> Result<Response, Error>
where
  S: AccountStore,
  I: IdentityProvider,
  P: PaymentProvider,
{
  let creds = json_body(body)?.validate()?;
  let outcome = state.identity.sign_up(creds.username.trim(), &creds.password).await.map_err(|e| {
    tracing::warn!(error = %e, "sign-up rejected by identity provider");
    Error::BadRequest("registration failed".to_owned())
  })?;

  match outcome {
    SignUpOutcome::Session(tokens) => Ok(Json(tokens).into_response()),
    SignUpOutcome::PendingVerification(user) => {
      tracing::info!(user_id = %user.id, "registration awaiting email confirmation");
      let body = RegistrationPending {
        message:               "Registration successful. Please check your email to verify your account.".to_owned(),
        user_id:               user.id,
        email:                 user.email.unwrap_or_else(|| creds.username.trim().to_owned()),
        requires_verification: true,
      };
      Ok((StatusCode::ACCEPTED, Json(body)).into_response())
    }
  }
}

/// `POST /api/auth/login`
pub async fn login<S, I, P>(
  State(state): State<AppState<S, I, P>>,
  LoginForm(creds): LoginForm,
) -> Result<Response, Error>
where
  S: AccountStore,
  I: IdentityProvider,
  P: PaymentProvider,
{
  let creds = creds.validate()?;
  let tokens = state.identity.sign_in(creds.username.trim(), &creds.password).await.map_err(|e| {
    tracing::info!(error = %e, "login rejected by identity provider");
    Error::Unauthorized
  })?;
  Ok(Json(tokens).into_response())
}

/// `GET /api/auth/session`
pub async fn session(user: CurrentUser) -> Json<SessionInfo> {
  Json(SessionInfo {
    subject_id: user.identity.subject_id,
    email:      user.identity.email,
    is_paying:  user.account.is_paying,
  })
}

/// `POST /api/auth/logout`
pub async fn logout<S, I, P>(
  State(state): State<AppState<S, I, P>>,
  user: CurrentUser,
) -> Result<Response, Error>
where
  S: AccountStore,
  I: IdentityProvider,
  P: PaymentProvider,
{
  state.identity.sign_out(&user.token).await.map_err(|e| {
    tracing::warn!(error = %e, "sign-out rejected by identity provider");
    Error::Unauthorized
  })?;
  Ok(Json(serde_json::json!({ "message": "Logged out successfully" })).into_response())
}

/// `POST /api/auth/refresh`
pub async fn refresh<S, I, P>(
  State(state): State<AppState<S, I, P>>,
  body: Result<Json<RefreshBody>, JsonRejection>,
) -> Result<Response, Error>
where
  S: AccountStore,
  I: IdentityProvider,
  P: PaymentProvider,
{
  let body = json_body(body)?;
  let tokens = state.identity.refresh(&body.refresh_token).await.map_err(|e| {
    tracing::info!(error = %e, "refresh rejected by identity provider");
    Error::Unauthorized
  })?;
  Ok(Json(tokens).into_response())
}
