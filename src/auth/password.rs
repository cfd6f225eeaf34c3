//! Password hashing
//!
//! Hashes are stored as `sha256$<iterations>$<salt hex>$<digest hex>`.

use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

const SCHEME: &str = "sha256";
const ITERATIONS: u32 = 10_000;
const SALT_LEN: usize = 16;

/// Password hash errors
#[derive(Error, Debug, PartialEq)]
pub enum PasswordError {
    #[error("Malformed password hash")]
    Malformed,

    #[error("Unsupported password hash scheme: {0}")]
    UnsupportedScheme(String),
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut digest: [u8; 32] = Sha256::new()
        .chain_update(salt)
        .chain_update(password.as_bytes())
        .finalize()
        .into();

    for _ in 1..iterations {
        digest = Sha256::new()
            .chain_update(salt)
            .chain_update(digest)
            .finalize()
            .into();
    }
    digest
}

/// Hash a password with a fresh random salt
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let digest = derive(password, &salt, ITERATIONS);
    format!("{}${}${}${}", SCHEME, ITERATIONS, hex::encode(salt), hex::encode(digest))
}

/// Check a password against a stored hash
pub fn verify_password(password: &str, stored: &str) -> Result<bool, PasswordError> {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(expected), None) =
        (parts.next(), parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(PasswordError::Malformed);
    };

    if scheme != SCHEME {
        return Err(PasswordError::UnsupportedScheme(scheme.to_string()));
    }

    let iterations: u32 = iterations.parse().map_err(|_| PasswordError::Malformed)?;
    if iterations == 0 {
        return Err(PasswordError::Malformed);
    }
    let salt = hex::decode(salt).map_err(|_| PasswordError::Malformed)?;
    let expected = hex::decode(expected).map_err(|_| PasswordError::Malformed)?;

    let actual = derive(password, &salt, iterations);
    Ok(constant_time_eq(&actual, &expected))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
