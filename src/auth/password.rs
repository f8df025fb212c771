// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Password hashing (bcrypt).

use std::sync::LazyLock;

use super::AuthError;

/// bcrypt work factor.
#[cfg(not(test))]
const HASH_COST: u32 = bcrypt::DEFAULT_COST;
#[cfg(test)]
const HASH_COST: u32 = 4;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Hash a password for storage.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    bcrypt::hash(password, HASH_COST)
        .map_err(|e| AuthError::InternalError(format!("Failed to hash password: {e}")))
}

/// Hash checked in place of a real one when the username is unknown, so
/// both failures cost one bcrypt verification at the same work factor.
pub static DUMMY_HASH: LazyLock<String> =
    LazyLock::new(|| hash_password("no-such-account-placeholder").unwrap_or_default());

/// Check a password against a stored hash.
///
/// A malformed stored hash counts as a mismatch rather than an error.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Reject passwords that are too short or all whitespace.
pub fn check_password_strength(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!("password must be at least {MIN_PASSWORD_LEN} characters"));
    }
    if password.trim().is_empty() {
        return Err("password must not be blank".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(hash.starts_with("$2"));
        assert!(verify_password("correct horse battery", &hash));
        assert!(!verify_password("wrong horse battery", &hash));
    }

    #[test]
    fn dummy_hash_is_real_bcrypt() {
        assert!(DUMMY_HASH.starts_with(&format!("$2b${HASH_COST:02}$")));
        assert!(!verify_password("s3cret-password", &DUMMY_HASH));
    }

    #[test]
    fn malformed_hash_is_mismatch() {
        assert!(!verify_password("anything", "not-a-bcrypt-hash"));
    }

    #[test]
    fn strength_rules() {
        assert!(check_password_strength("short").is_err());
        assert!(check_password_strength("         ").is_err());
        assert!(check_password_strength("long enough").is_ok());
    }
}
