//! Authentication extractors.
//!
//! Handlers take the authenticated principal as an argument:
//!
//! ```rust,ignore
//! async fn protected_handler(RequireAuth(principal): RequireAuth) -> impl IntoResponse {
//!     format!("Hello, user {}!", principal.id)
//! }
//! ```
//!
//! The token is read from `Authorization: Bearer <token>` and verified with
//! the state's [`TokenVerifier`](crate::services::TokenVerifier).

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::db::Store;
use crate::error::{AppError, set_sentry_user};
use crate::models::Principal;
use crate::services::{AuthError, PaymentGateway};
use crate::state::AppState;

/// Extractor that requires a valid bearer token.
///
/// Rejects with 401 when the header is missing or the token does not verify.
pub struct RequireAuth(pub Principal);

/// Extractor that requires a valid bearer token with the admin role.
///
/// Rejects with 401 like [`RequireAuth`], then 403 for non-admins.
pub struct RequireAdmin(pub Principal);

impl<S: Store, P: PaymentGateway> FromRequestParts<AppState<S, P>> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S, P>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let principal = state.verifier().verify(token)?;

        tracing::Span::current().record("user_id", principal.id.as_i64());
        set_sentry_user(&principal.id);

        Ok(Self(principal))
    }
}

impl<S: Store, P: PaymentGateway> FromRequestParts<AppState<S, P>> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S, P>,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(principal) = RequireAuth::from_request_parts(parts, state).await?;
        if !principal.is_admin() {
            return Err(AppError::Forbidden);
        }
        Ok(Self(principal))
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    let value = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::Malformed("authorization header is not ASCII"))?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or(AuthError::Malformed("expected a bearer token"))?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::Malformed("expected a bearer token"));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}
