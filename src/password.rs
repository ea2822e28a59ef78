use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand::rngs::OsRng;

use crate::error::ServiceError;

/// Argon2id PHC string for `plain`, with a fresh random salt.
pub fn hash_password(plain: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            tracing::error!(error = %e, "argon2 hash_password error");
            ServiceError::Internal(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

/// False on a mismatch. A stored hash that does not parse is an error.
pub fn verify_password(plain: &str, hash: &str) -> Result<bool, ServiceError> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        tracing::error!(error = %e, "argon2 parse hash error");
        ServiceError::Internal(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}
