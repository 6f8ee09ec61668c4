//! Cryptographic utilities for the server

use crate::error::ApiError;

/// Default bcrypt cost factor
pub const BCRYPT_COST: u32 = 12;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// bcrypt ignores input past 72 bytes; longer passwords are refused outright
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Check password length bounds
pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::InvalidInput(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(ApiError::InvalidInput(format!(
            "Password must be at most {} bytes",
            MAX_PASSWORD_BYTES
        )));
    }
    Ok(())
}

/// Hash a password with bcrypt
pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, cost)
}

/// Verify a password against a bcrypt hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    bcrypt::verify(password, hash)
}

/// Hash on the blocking pool so slow bcrypt rounds don't stall the runtime
pub async fn hash_password_blocking(password: String, cost: u32) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(|e| ApiError::Upstream(format!("Hashing task failed: {}", e)))?
        .map_err(|e| ApiError::Upstream(format!("Password hashing failed: {}", e)))
}

pub async fn verify_password_blocking(password: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ApiError::Upstream(format!("Hashing task failed: {}", e)))?
        .map_err(|e| ApiError::Upstream(format!("Password check failed: {}", e)))
}

/// Generate a fresh opaque document id
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
