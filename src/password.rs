//! Password hashing and verification.
//!
//! Argon2id with the default parameters (memory-hard, well above a bcrypt
//! cost-10 work factor). Hashes are stored as PHC strings, which embed the
//! salt and parameters, so nothing else needs to be persisted. Hashing is
//! CPU-heavy; callers run it under `spawn_blocking`.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

/// Hash a plaintext password. Returns the PHC string to store.
pub fn hash(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let hashed = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(PasswordError::Hashing)?;
    Ok(hashed.to_string())
}

/// Verify a plaintext password against a stored PHC hash.
/// A mismatch is `Ok(false)`, not an error.
pub fn verify(password: &str, stored: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(stored).map_err(PasswordError::InvalidHash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::Hashing(e)),
    }
}

/// Errors that can occur while hashing or verifying passwords.
#[derive(Debug)]
pub enum PasswordError {
    /// The hashing computation itself failed
    Hashing(argon2::password_hash::Error),
    /// The stored hash is not a valid PHC string
    InvalidHash(argon2::password_hash::Error),
}

impl std::fmt::Display for PasswordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PasswordError::Hashing(e) => write!(f, "Password hashing failed: {}", e),
            PasswordError::InvalidHash(e) => write!(f, "Invalid stored password hash: {}", e),
        }
    }
}

impl std::error::Error for PasswordError {}
