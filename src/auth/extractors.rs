use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::warn;
use uuid::Uuid;

use super::cookie::token_from_cookies;
use crate::{error::ApiError, state::AppState};

const NO_TOKEN: &str = "No token provided, authorization denied";
const BAD_TOKEN: &str = "Token invalid or expired";

/// Authenticated caller. Handlers that take this extractor only run once
/// the request's token has been verified.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

/// Where the gate found a usable token.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum TokenSource {
    Bearer(String),
    Cookie(String),
}

/// `Some(Ok(token))` for a well-formed bearer header, `Some(Err(()))` for a
/// header with another scheme or an empty token, `None` without a header.
fn bearer_token(headers: &HeaderMap) -> Option<Result<String, ()>> {
    let value = headers.get(AUTHORIZATION)?;
    let parsed = value
        .to_str()
        .ok()
        .map(str::trim)
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or(());
    Some(parsed)
}

/// The header always wins. The cookie is only consulted when the header is
/// absent and `accept_cookie` is set.
pub(crate) fn extract_token(
    headers: &HeaderMap,
    accept_cookie: bool,
) -> Result<TokenSource, ApiError> {
    match bearer_token(headers) {
        Some(Ok(token)) => Ok(TokenSource::Bearer(token)),
        Some(Err(())) => Err(ApiError::Unauthorized(NO_TOKEN)),
        None if accept_cookie => token_from_cookies(headers)
            .map(TokenSource::Cookie)
            .ok_or(ApiError::Unauthorized(NO_TOKEN)),
        None => Err(ApiError::Unauthorized(NO_TOKEN)),
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let source = extract_token(&parts.headers, state.config.auth.accept_cookie)
            .inspect_err(|_| warn!("request without usable token"))?;
        let token = match &source {
            TokenSource::Bearer(t) | TokenSource::Cookie(t) => t,
        };

        let claims = state.keys.verify(token).map_err(|e| {
            warn!(error = %e, "invalid or expired token");
            ApiError::Unauthorized(BAD_TOKEN)
        })?;

        Ok(AuthUser(claims.sub))
    }
}
