//! Salted password hashing with Argon2.

use argon2::{
    password_hash::{
        rand_core::OsRng, Error as HashError, PasswordHash, PasswordHasher, PasswordVerifier,
        SaltString,
    },
    Argon2,
};

use crate::CoreError;

/// Hash a plain-text password into a PHC string with a fresh random salt.
///
/// # Errors
///
/// Returns [`CoreError::PasswordHash`] if the password is empty or hashing fails.
pub fn hash_password(password: &str) -> Result<String, CoreError> {
    if password.is_empty() {
        return Err(CoreError::PasswordHash(
            "password must not be empty".to_string(),
        ));
    }
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CoreError::PasswordHash(e.to_string()))
}

/// Check a plain-text password against a stored PHC hash.
///
/// A mismatch is `Ok(false)`.
///
/// # Errors
///
/// Returns [`CoreError::PasswordHash`] if the stored hash cannot be parsed.
pub fn verify_password(stored_hash: &str, provided: &str) -> Result<bool, CoreError> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| CoreError::PasswordHash(e.to_string()))?;
    match Argon2::default().verify_password(provided.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(HashError::Password) => Ok(false),
        Err(e) => Err(CoreError::PasswordHash(e.to_string())),
    }
}
