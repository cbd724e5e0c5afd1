use std::sync::Arc;

use anyhow::Context;
use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{AuthResponse, LoginRequest, PublicUser, RegisterRequest},
    jwt::JwtKeys,
    password::Passwords,
    repo::UserRepo,
    repo_types::{NewUser, RepoError},
};
use crate::{error::ApiError, state::AppState};

pub const MIN_NAME_CHARS: usize = 2;
pub const MIN_PASSWORD_CHARS: usize = 6;

const INVALID_CREDENTIALS: &str = "Invalid credentials";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trimmed, lowercased form used for storage and lookup.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|v| !v.trim().is_empty())
}

/// Registration, login and profile lookup.
#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserRepo>,
    keys: JwtKeys,
    passwords: Passwords,
}

impl FromRef<AppState> for AccountService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(
            state.users.clone(),
            state.keys.clone(),
            state.passwords.clone(),
        )
    }
}

impl AccountService {
    pub fn new(users: Arc<dyn UserRepo>, keys: JwtKeys, passwords: Passwords) -> Self {
        Self {
            users,
            keys,
            passwords,
        }
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<AuthResponse, ApiError> {
        let (Some(name), Some(email), Some(password)) =
            (present(&req.name), present(&req.email), present(&req.password))
        else {
            return Err(ApiError::validation("All fields are required"));
        };

        let name = name.trim();
        if name.chars().count() < MIN_NAME_CHARS {
            return Err(ApiError::validation(format!(
                "Name must be at least {MIN_NAME_CHARS} characters"
            )));
        }

        let email = normalize_email(email);
        if !is_valid_email(&email) {
            warn!(email = %email, "invalid email");
            return Err(ApiError::validation("Invalid email"));
        }

        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(ApiError::validation(format!(
                "Password must be at least {MIN_PASSWORD_CHARS} characters"
            )));
        }

        let password_hash = self.passwords.hash(password).await?;
        let user = match self
            .users
            .create(NewUser {
                name: name.to_string(),
                email,
                password_hash,
            })
            .await
        {
            Ok(u) => u,
            Err(RepoError::Conflict) => {
                warn!("email already registered");
                return Err(ApiError::Conflict("Email already registered".into()));
            }
            Err(RepoError::Other(e)) => return Err(ApiError::Internal(e)),
        };

        let token = self.issue(user.id)?;
        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(AuthResponse {
            token,
            user: user.into(),
        })
    }

    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse, ApiError> {
        let (Some(email), Some(password)) = (present(&req.email), present(&req.password)) else {
            return Err(ApiError::validation("Email and password required"));
        };
        let email = normalize_email(email);

        let Some(user) = self.users.find_by_email(&email).await? else {
            self.passwords.verify_decoy(password).await?;
            warn!(email = %email, "login unknown email");
            return Err(ApiError::Unauthorized(INVALID_CREDENTIALS));
        };

        if !self.passwords.verify(password, &user.password_hash).await? {
            warn!(email = %email, user_id = %user.id, "login invalid password");
            return Err(ApiError::Unauthorized(INVALID_CREDENTIALS));
        }

        let token = self.issue(user.id)?;
        info!(user_id = %user.id, email = %user.email, "user logged in");
        Ok(AuthResponse {
            token,
            user: user.into(),
        })
    }

    pub async fn current_user(&self, user_id: Uuid) -> Result<PublicUser, ApiError> {
        self.users
            .find_by_id(user_id)
            .await?
            .map(PublicUser::from)
            .ok_or(ApiError::NotFound("User not found"))
    }

    fn issue(&self, user_id: Uuid) -> Result<String, ApiError> {
        Ok(self.keys.issue(user_id).context("issue session token")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::repo::MemoryUserRepo, config::JwtConfig};
    use std::time::Duration;

    fn service() -> AccountService {
        let keys = JwtKeys::new(&JwtConfig {
            secret: "test".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl: Duration::from_secs(60 * 60),
        });
        let passwords = Passwords::new(&crate::auth::password::fast_config()).unwrap();
        AccountService::new(Arc::new(MemoryUserRepo::default()), keys, passwords)
    }

    fn register_req(name: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: Some(name.into()),
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    fn login_req(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@x.com"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("ax.com"));
        assert!(!is_valid_email("a b@x.com"));
    }

    #[tokio::test]
    async fn register_then_login_returns_same_user() {
        let svc = service();
        let registered = svc
            .register(register_req("Ann", "a@x.com", "secret1"))
            .await
            .expect("register");
        let logged_in = svc.login(login_req("a@x.com", "secret1")).await.expect("login");

        assert_eq!(registered.user.id, logged_in.user.id);
        let claims = svc.keys.verify(&logged_in.token).expect("token verifies");
        assert_eq!(claims.sub, registered.user.id);
    }

    #[tokio::test]
    async fn email_is_normalized() {
        let svc = service();
        let res = svc
            .register(register_req("  Ann  ", "  A@X.Com ", "secret1"))
            .await
            .expect("register");
        assert_eq!(res.user.email, "a@x.com");
        assert_eq!(res.user.name, "Ann");
        svc.login(login_req("A@x.COM", "secret1")).await.expect("login any case");
    }

    #[tokio::test]
    async fn duplicate_email_in_any_case_conflicts() {
        let svc = service();
        svc.register(register_req("Ann", "a@x.com", "secret1"))
            .await
            .expect("first");
        for email in ["a@x.com", "A@X.COM", " a@x.com "] {
            let err = svc
                .register(register_req("Bob", email, "secret2"))
                .await
                .unwrap_err();
            assert!(matches!(err, ApiError::Conflict(_)), "{email}: {err:?}");
        }
    }

    #[tokio::test]
    async fn missing_fields_fail_validation() {
        let svc = service();
        let cases = [
            RegisterRequest::default(),
            RegisterRequest {
                name: Some("Ann".into()),
                email: Some("a@x.com".into()),
                password: None,
            },
            register_req("   ", "a@x.com", "secret1"),
        ];
        for req in cases {
            let err = svc.register(req).await.unwrap_err();
            assert!(matches!(&err, ApiError::Validation(m) if m == "All fields are required"));
        }
        let err = svc.login(LoginRequest::default()).await.unwrap_err();
        assert!(matches!(&err, ApiError::Validation(m) if m == "Email and password required"));
    }

    #[tokio::test]
    async fn malformed_fields_fail_validation() {
        let svc = service();
        for req in [
            register_req("A", "a@x.com", "secret1"),
            register_req("Ann", "not-an-email", "secret1"),
            register_req("Ann", "a@x.com", "12345"),
        ] {
            let err = svc.register(req).await.unwrap_err();
            assert!(matches!(err, ApiError::Validation(_)), "{err:?}");
        }
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_are_indistinguishable() {
        let svc = service();
        svc.register(register_req("Ann", "a@x.com", "secret1"))
            .await
            .expect("register");

        let wrong_pw = svc.login(login_req("a@x.com", "nope123")).await.unwrap_err();
        let unknown = svc.login(login_req("b@x.com", "secret1")).await.unwrap_err();
        assert_eq!(wrong_pw.status(), unknown.status());
        assert_eq!(wrong_pw.to_string(), unknown.to_string());
        assert_eq!(wrong_pw.to_string(), "Invalid credentials");
    }

    #[tokio::test]
    async fn current_user_has_no_password_field() {
        let svc = service();
        let res = svc
            .register(register_req("Ann", "a@x.com", "secret1"))
            .await
            .expect("register");
        let me = svc.current_user(res.user.id).await.expect("me");
        assert_eq!(me, res.user);

        let json = serde_json::to_value(&me).unwrap();
        let obj = json.as_object().unwrap();
        assert!(obj.keys().all(|k| !k.contains("password")));
        assert_eq!(obj["name"], "Ann");
    }

    #[tokio::test]
    async fn current_user_unknown_id_is_not_found() {
        let err = service().current_user(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
