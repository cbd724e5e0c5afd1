use std::sync::Arc;

use tracing::warn;

use crate::auth::jwt::JwtKeys;
use crate::auth::password::Passwords;
use crate::auth::repo::{MemoryUserRepo, PgUserRepo, UserRepo};
use crate::config::AppConfig;
use crate::db;
use crate::expenses::repo::{ExpenseRepo, MemoryExpenseRepo, PgExpenseRepo};

/// Shared, immutable-after-startup request state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub keys: JwtKeys,
    pub passwords: Passwords,
    pub users: Arc<dyn UserRepo>,
    pub expenses: Arc<dyn ExpenseRepo>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let Some(url) = config.database_url.as_deref() else {
            warn!("DATABASE_URL not set; using in-memory stores, data is lost on restart");
            return Self::in_memory(config);
        };

        let pool = db::connect(url).await?;
        Self::from_parts(
            config,
            Arc::new(PgUserRepo::new(pool.clone())),
            Arc::new(PgExpenseRepo::new(pool)),
        )
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserRepo>,
        expenses: Arc<dyn ExpenseRepo>,
    ) -> anyhow::Result<Self> {
        let keys = JwtKeys::new(&config.jwt);
        let passwords = Passwords::new(&config.password)?;
        Ok(Self {
            config,
            keys,
            passwords,
            users,
            expenses,
        })
    }

    pub fn in_memory(config: Arc<AppConfig>) -> anyhow::Result<Self> {
        Self::from_parts(
            config,
            Arc::new(MemoryUserRepo::default()),
            Arc::new(MemoryExpenseRepo::default()),
        )
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        Self::fake_with(|_| {})
    }

    /// In-memory state with a cheap password hasher and a tweakable config.
    #[cfg(test)]
    pub fn fake_with(tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let mut config =
            AppConfig::from_lookup(|_| None).expect("default config loads without environment");
        config.jwt.secret = "test".into();
        config.password = crate::auth::password::fast_config();
        tweak(&mut config);
        Self::in_memory(Arc::new(config)).expect("test state builds")
    }
}
