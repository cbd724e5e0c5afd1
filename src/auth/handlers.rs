use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::SET_COOKIE, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use anyhow::Context;
use tracing::instrument;

use crate::{
    auth::{
        cookie::{clear_session_cookie, session_cookie},
        dto::{AuthResponse, LoginRequest, PublicUser, RegisterRequest},
        extractors::AuthUser,
        service::AccountService,
    },
    error::ApiError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/auth/me", get(get_me))
}

fn token_cookie(state: &AppState, res: &AuthResponse) -> Result<HeaderValue, ApiError> {
    let ttl = state.keys.ttl.as_secs();
    Ok(session_cookie(&state.config.auth, &res.token, ttl).context("build session cookie")?)
}

#[instrument(skip(state, accounts, payload))]
pub async fn register(
    State(state): State<AppState>,
    State(accounts): State<AccountService>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, [(axum::http::HeaderName, HeaderValue); 1], Json<AuthResponse>), ApiError>
{
    let Json(payload) = payload?;
    let res = accounts.register(payload).await?;
    let cookie = token_cookie(&state, &res)?;
    Ok((StatusCode::CREATED, [(SET_COOKIE, cookie)], Json(res)))
}

#[instrument(skip(state, accounts, payload))]
pub async fn login(
    State(state): State<AppState>,
    State(accounts): State<AccountService>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<([(axum::http::HeaderName, HeaderValue); 1], Json<AuthResponse>), ApiError> {
    let Json(payload) = payload?;
    let res = accounts.login(payload).await?;
    let cookie = token_cookie(&state, &res)?;
    Ok(([(SET_COOKIE, cookie)], Json(res)))
}

/// Clears the cookie. Issued tokens stay valid until they expire.
#[instrument(skip(state))]
pub async fn logout(
    State(state): State<AppState>,
) -> Result<(StatusCode, [(axum::http::HeaderName, HeaderValue); 1]), ApiError> {
    let cookie = clear_session_cookie(&state.config.auth).context("build clearing cookie")?;
    Ok((StatusCode::NO_CONTENT, [(SET_COOKIE, cookie)]))
}

#[instrument(skip(accounts))]
pub async fn get_me(
    State(accounts): State<AccountService>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, ApiError> {
    Ok(Json(accounts.current_user(user_id).await?))
}

