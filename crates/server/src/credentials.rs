//! Password hashing and the login token.
//!
//! Hashes are argon2id PHC strings: salt and parameters travel inside the
//! string, the ledger stores it as-is. Hashing is CPU-bound and runs on the
//! blocking pool.

use argon2::{
    Argon2, Params, PasswordHasher, PasswordVerifier,
    password_hash::{PasswordHash, SaltString, rand_core::OsRng},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};

use crate::ServerError;

/// Longest accepted password, in bytes.
pub const MAX_PASSWORD_BYTES: usize = 72;

#[derive(Clone, Default)]
pub struct Passwords {
    argon2: Argon2<'static>,
}

impl Passwords {
    /// Argon2id with `memory_kib` KiB of memory and `iterations` passes.
    pub fn with_cost(memory_kib: u32, iterations: u32) -> Result<Self, ServerError> {
        let params = Params::new(memory_kib, iterations, 1, None)
            .map_err(|err| ServerError::Internal(format!("invalid argon2 parameters: {err}")))?;
        Ok(Self {
            argon2: Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params),
        })
    }

    pub async fn hash(&self, password: &str) -> Result<String, ServerError> {
        let argon2 = self.argon2.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            argon2
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|err| ServerError::Internal(format!("password hashing failed: {err}")))
        })
        .await
        .map_err(|err| ServerError::Internal(format!("password hashing task failed: {err}")))?
    }

    /// `false` for a wrong password and for a hash that does not parse.
    pub async fn verify(&self, password: &str, password_hash: &str) -> Result<bool, ServerError> {
        let argon2 = self.argon2.clone();
        let password = password.to_string();
        let password_hash = password_hash.to_string();
        tokio::task::spawn_blocking(move || {
            PasswordHash::new(&password_hash).is_ok_and(|parsed| {
                argon2
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
            })
        })
        .await
        .map_err(|err| ServerError::Internal(format!("password check task failed: {err}")))
    }
}

/// The token returned by `/api/auth`: the user's Basic credentials.
pub fn token(username: &str, password: &str) -> String {
    STANDARD.encode(format!("{username}:{password}"))
}
