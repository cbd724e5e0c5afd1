use std::time::Duration;

use anyhow::{bail, Context};

/// Signing secret used outside production when `JWT_SECRET` is not set.
pub const DEV_JWT_SECRET: &str = "expense-tracker";

/// Longest accepted session token lifetime.
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

/// Argon2 cost parameters applied to newly hashed passwords.
#[derive(Debug, Clone, Copy)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

impl PasswordConfig {
    pub fn params(&self) -> anyhow::Result<argon2::Params> {
        argon2::Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 cost: {e}"))
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Mark the session cookie `Secure`.
    pub cookie_secure: bool,
    /// Let the auth gate fall back to the `token` cookie when no
    /// `Authorization` header is sent.
    pub accept_cookie: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
    pub auth: AuthConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = match var("APP_ENV").as_deref().map(str::to_ascii_lowercase) {
            None => Environment::Development,
            Some(v) if v == "production" || v == "prod" => Environment::Production,
            Some(v) if v == "development" || v == "dev" => Environment::Development,
            Some(other) => bail!("unknown APP_ENV {other:?}"),
        };

        let secret = match var("JWT_SECRET") {
            Some(secret) => secret,
            None if environment == Environment::Production => {
                bail!("JWT_SECRET must be set when APP_ENV=production")
            }
            None => {
                tracing::warn!("JWT_SECRET not set; using the development signing secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        let ttl = match var("JWT_EXPIRES_IN") {
            Some(raw) => parse_ttl(&raw).with_context(|| format!("JWT_EXPIRES_IN={raw:?}"))?,
            None => Duration::from_secs(7 * 24 * 60 * 60),
        };

        let jwt = JwtConfig {
            secret,
            issuer: var("JWT_ISSUER").unwrap_or_else(|| "expense-tracker".into()),
            audience: var("JWT_AUDIENCE").unwrap_or_else(|| "expense-tracker-users".into()),
            ttl,
        };

        let defaults = PasswordConfig::default();
        let password = PasswordConfig {
            memory_kib: parse_or(&var, "ARGON2_MEMORY_KIB", defaults.memory_kib)?,
            iterations: parse_or(&var, "ARGON2_ITERATIONS", defaults.iterations)?,
            parallelism: parse_or(&var, "ARGON2_PARALLELISM", defaults.parallelism)?,
        };
        password.params().context("ARGON2_MEMORY_KIB/ITERATIONS/PARALLELISM")?;

        let auth = AuthConfig {
            cookie_secure: parse_bool(&var, "COOKIE_SECURE")?,
            accept_cookie: parse_bool(&var, "AUTH_ACCEPT_COOKIE")?,
        };

        let port = match var("APP_PORT").or_else(|| var("PORT")) {
            Some(raw) => raw.parse().with_context(|| format!("invalid port {raw:?}"))?,
            None => 5000,
        };

        Ok(Self {
            environment,
            database_url: var("DATABASE_URL"),
            host: var("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            cors_origin: var("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:5173".into()),
            jwt,
            password,
            auth,
        })
    }
}

fn parse_or<F, T>(var: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw.trim().parse().with_context(|| format!("{key}={raw:?}")),
        None => Ok(default),
    }
}

fn parse_bool<F>(var: &F, key: &str) -> anyhow::Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match var(key).as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => bail!("{key} must be a boolean, got {v:?}"),
        },
    }
}

/// Parse a lifetime such as `7d`, `12h`, `30m`, `45s` or a bare number of seconds.
pub fn parse_ttl(raw: &str) -> anyhow::Result<Duration> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    if digits.is_empty() {
        bail!("missing amount");
    }
    let amount: u64 = digits.parse().context("amount out of range")?;
    let per_unit = match unit.trim() {
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        other => bail!("unknown unit {other:?}"),
    };
    let secs = amount
        .checked_mul(per_unit)
        .context("lifetime out of range")?;
    if secs == 0 {
        bail!("lifetime must be positive");
    }
    if secs > MAX_TOKEN_TTL.as_secs() {
        bail!("lifetime exceeds {} days", MAX_TOKEN_TTL.as_secs() / 86_400);
    }
    Ok(Duration::from_secs(secs))
}
