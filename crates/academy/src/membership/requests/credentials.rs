//! Credential issuance for accounts provisioned from approved requests.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::distr::Alphanumeric;
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};

const MIN_PASSWORD_LENGTH: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// Random alphanumeric password; lengths below the minimum are raised to it.
pub fn generate_password(length: usize) -> SecretString {
    let password: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(length.max(MIN_PASSWORD_LENGTH))
        .map(char::from)
        .collect();
    SecretString::from(password)
}

/// Argon2id PHC string for storage on the member account.
pub fn hash_password(password: &SecretString) -> Result<String, CredentialError> {
    let mut salt = [0u8; 16];
    rand::rng().fill(&mut salt[..]);
    let salt =
        SaltString::encode_b64(&salt).map_err(|err| CredentialError::Hash(err.to_string()))?;

    Argon2::default()
        .hash_password(password.expose_secret().as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| CredentialError::Hash(err.to_string()))
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}
