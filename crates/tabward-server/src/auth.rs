//! Bearer-token verification and the [`CurrentUser`] extractor.
//!
//! A token is accepted only when its HS256 signature, expiry and audience
//! check out locally *and* the identity provider still recognises the user it
//! names.

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use tabward_core::{
  account::{Account, Identity},
  store::AccountStore,
};

use crate::{
  AppState,
  config::IdentityConfig,
  error::Error,
  identity::IdentityProvider,
  payments::PaymentProvider,
};

/// Claims read from a provider-issued access token.
#[derive(Debug, Deserialize)]
pub struct Claims {
  pub sub:   String,
  #[serde(default)]
  pub email: Option<String>,
}

/// Local signature/expiry/audience check for access tokens.
pub struct TokenVerifier {
  key:        DecodingKey,
  validation: Validation,
}

impl TokenVerifier {
  pub fn new(config: &IdentityConfig) -> Self {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_required_spec_claims(&["exp", "sub"]);
    match config.audience.as_deref().map(str::trim).filter(|aud| !aud.is_empty()) {
      Some(aud) => validation.set_audience(&[aud]),
      None => validation.validate_aud = false,
    }
    Self { key: DecodingKey::from_secret(config.jwt_secret.as_bytes()), validation }
  }

  pub fn decode(&self, token: &str) -> Result<Claims, Error> {
    decode::<Claims>(token, &self.key, &self.validation)
      .map(|data| data.claims)
      .map_err(|e| {
        tracing::debug!(error = %e, "rejected bearer token");
        Error::Unauthorized
      })
  }
}

/// Extract the token from an `Authorization: Bearer …` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, Error> {
  let value = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::Unauthorized)?;

  let (scheme, token) = value.split_once(' ').ok_or(Error::Unauthorized)?;
  let token = token.trim();
  if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
    return Err(Error::Unauthorized);
  }
  Ok(token)
}

/// Resolve a bearer token to a verified identity. Touches no storage.
pub async fn resolve<I: IdentityProvider>(
  verifier: &TokenVerifier,
  provider: &I,
  token: &str,
) -> Result<Identity, Error> {
  let claims = verifier.decode(token)?;
  if claims.sub.is_empty() {
    return Err(Error::Unauthorized);
  }

  let user = provider.user(token).await.map_err(|e| {
    tracing::warn!(error = %e, "identity provider lookup failed");
    Error::Unauthorized
  })?;
  if user.id != claims.sub {
    tracing::warn!(sub = %claims.sub, provider_id = %user.id, "token subject does not match provider user");
    return Err(Error::Unauthorized);
  }

  let email = user
    .email
    .or(claims.email)
    .filter(|e| !e.trim().is_empty())
    .ok_or(Error::Unauthorized)?;

  Ok(Identity { subject_id: claims.sub, email })
}

/// An authenticated request: the verified identity, its account (created on
/// first sight), and the raw token for calls made on the user's behalf.
pub struct CurrentUser {
  pub identity: Identity,
  pub account:  Account,
  pub token:    String,
}

impl<S, I, P> FromRequestParts<AppState<S, I, P>> for CurrentUser
where
  S: AccountStore,
  I: IdentityProvider,
  P: PaymentProvider,
{
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, I, P>,
  ) -> Result<Self, Self::Rejection> {
    let token = bearer_token(&parts.headers)?.to_owned();
    let identity = resolve(&state.tokens, &*state.identity, &token).await?;
    let account = state.store.ensure_account(&identity).await.map_err(Error::store)?;
    Ok(CurrentUser { identity, account, token })
  }
}
