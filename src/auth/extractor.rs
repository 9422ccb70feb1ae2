//! `CurrentUser` extractor for bearer-authenticated routes.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::{
    errors::AppError, models::user::User, state::AppState,
    services::user_service::UserError,
};

/// The account behind the request's `Authorization: Bearer <token>` header.
///
/// Rejects with 401 when the header is missing or malformed, the token does
/// not validate, or its subject no longer exists.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(credentials_error)?;
        let claims = state.tokens.validate(token).map_err(|err| {
            tracing::debug!("rejecting bearer token: {}", err);
            credentials_error()
        })?;

        match state.users.get_by_username(&claims.sub).await {
            Ok(user) => Ok(CurrentUser(user)),
            Err(UserError::NotFound) => Err(credentials_error()),
            Err(other) => Err(other.into()),
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

fn credentials_error() -> AppError {
    AppError::unauthorized("Could not validate credentials")
}
