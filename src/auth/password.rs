use std::sync::Arc;

use anyhow::Context;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Version,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::config::PasswordConfig;

fn hasher(cfg: &PasswordConfig) -> anyhow::Result<Argon2<'static>> {
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, cfg.params()?))
}

/// Hash a password into a PHC string with a fresh random salt.
fn hash_with(argon: &Argon2<'_>, plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = argon
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

/// Check a password against a stored PHC string. The salt and cost
/// parameters come from the hash itself.
pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Argon2 hashing for request handlers. Built once at startup; the work
/// runs on the blocking pool.
#[derive(Clone)]
pub struct Passwords {
    argon: Arc<Argon2<'static>>,
    /// Hash checked when the account does not exist so that unknown emails
    /// cost the same as wrong passwords.
    decoy: Arc<str>,
}

impl Passwords {
    pub fn new(cfg: &PasswordConfig) -> anyhow::Result<Self> {
        let argon = hasher(cfg)?;
        let unguessable = SaltString::generate(&mut OsRng);
        let decoy = hash_with(&argon, unguessable.as_str())?;
        Ok(Self {
            argon: Arc::new(argon),
            decoy: decoy.into(),
        })
    }

    pub async fn hash(&self, plain: &str) -> anyhow::Result<String> {
        let argon = self.argon.clone();
        let plain = plain.to_owned();
        tokio::task::spawn_blocking(move || hash_with(&argon, &plain))
            .await
            .context("password hashing task")?
    }

    pub async fn verify(&self, plain: &str, hash: &str) -> anyhow::Result<bool> {
        let plain = plain.to_owned();
        let hash = hash.to_owned();
        tokio::task::spawn_blocking(move || verify_password(&plain, &hash))
            .await
            .context("password verification task")?
    }

    /// Spend one verification on the decoy hash. Always a mismatch.
    pub async fn verify_decoy(&self, plain: &str) -> anyhow::Result<bool> {
        let decoy = self.decoy.clone();
        self.verify(plain, &decoy).await
    }
}

#[cfg(test)]
pub(crate) fn fast_config() -> PasswordConfig {
    PasswordConfig {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    }
}
