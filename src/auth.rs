//! Password hashing and API token generation

use argon2::password_hash::rand_core::{OsRng, RngCore};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("Invalid credentials")]
    InvalidCredentials,
}

/// Compute an Argon2id password hash
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswordHash(e.to_string()))
}

/// Verify a password against an encoded Argon2id hash
pub fn verify_password(hash: &str, candidate: &str) -> Result<(), AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|e| AuthError::PasswordHash(e.to_string()))?;
    Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// Generate a fresh opaque API token
pub fn new_token() -> String {
    let mut raw = [0u8; 32];
    OsRng.fill_bytes(&mut raw);
    URL_SAFE_NO_PAD.encode(raw)
}
