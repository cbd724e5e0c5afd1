use axum::http::{header::InvalidHeaderValue, HeaderMap, HeaderValue};

use crate::config::AuthConfig;

pub const TOKEN_COOKIE: &str = "token";

/// Build the `HttpOnly` session cookie carrying the token.
pub fn session_cookie(
    cfg: &AuthConfig,
    token: &str,
    ttl_seconds: u64,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie =
        format!("{TOKEN_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}");
    if cfg.cookie_secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub fn clear_session_cookie(cfg: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{TOKEN_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if cfg.cookie_secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Value of the `token` cookie, if the request carries one.
pub fn token_from_cookies(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(axum::http::header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == TOKEN_COOKIE)
        .map(|(_, val)| val.trim().to_string())
        .filter(|val| !val.is_empty())
}
