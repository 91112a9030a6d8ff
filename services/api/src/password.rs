//! services/api/src/password.rs
//!
//! Argon2 hashing for the login secret.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use doorlock_core::ports::{PortError, PortResult};

/// Hashes a secret into a PHC string.
pub fn hash_password(secret: &str) -> PortResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PortError::InternalFailure(format!("Failed to hash password: {}", e)))
}

/// Checks a secret against a stored PHC string. The comparison is constant-time.
pub fn verify_password(secret: &str, stored_hash: &str) -> PortResult<bool> {
    let parsed_hash = PasswordHash::new(stored_hash).map_err(|e| {
        PortError::InternalFailure(format!("Failed to parse password hash: {}", e))
    })?;
    Ok(Argon2::default()
        .verify_password(secret.as_bytes(), &parsed_hash)
        .is_ok())
}
