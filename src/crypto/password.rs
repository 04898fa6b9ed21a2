//! Argon2id password hashing (PHC string format, random salt).

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::core::errors::WalletError;

pub fn hash_password(password: &str) -> Result<String, WalletError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| WalletError::CryptoError(format!("Password hashing failed: {}", e)))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, WalletError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| WalletError::CryptoError(format!("Stored password hash is invalid: {}", e)))?;
    Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}
