//! Credential hashing and bearer token generation
//!
//! # Pure Functions
//!
//! This module contains ONLY pure functions. No HTTP framework dependencies;
//! the planner wraps these in its sign-in and session middleware.
//!
//! Password digest: SHA-256 over `salt || ':' || password`, stored as 64 hex
//! characters next to a per-user random salt.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Byte length of generated bearer and recovery tokens
const TOKEN_BYTES: usize = 32;
/// Byte length of generated password salts
const SALT_BYTES: usize = 16;

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 6;

/// Generate a random salt as hex
pub fn generate_salt() -> String {
    random_hex(SALT_BYTES)
}

/// Generate an opaque bearer/recovery token as hex
pub fn generate_token() -> String {
    random_hex(TOKEN_BYTES)
}

/// Digest a password with its salt
///
/// # Examples
///
/// ```
/// use spz_common::api::auth::hash_password;
///
/// let digest = hash_password("hunter22", "abcd");
/// assert_eq!(digest.len(), 64);
/// assert_eq!(digest, hash_password("hunter22", "abcd"));
/// ```
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Check a password against a stored digest
///
/// Comparison runs over every byte regardless of where the first mismatch is.
pub fn verify_password(password: &str, salt: &str, stored_hash: &str) -> bool {
    let calculated = hash_password(password, salt);
    constant_time_eq(calculated.as_bytes(), stored_hash.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_accepts_correct_password() {
        let salt = generate_salt();
        let stored = hash_password("correct horse", &salt);
        assert!(verify_password("correct horse", &salt, &stored));
    }

    #[test]
    fn test_verify_rejects_wrong_password() {
        let salt = generate_salt();
        let stored = hash_password("correct horse", &salt);
        assert!(!verify_password("battery staple", &salt, &stored));
    }

    #[test]
    fn test_salt_changes_digest() {
        assert_ne!(hash_password("same", "salt-a"), hash_password("same", "salt-b"));
    }

    #[test]
    fn test_tokens_are_unique_hex() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), TOKEN_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_constant_time_eq_length_mismatch() {
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"abcd", b"abcd"));
    }
}
