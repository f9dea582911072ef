//! One-way password hashing and verification (Argon2id, PHC-encoded strings).
//!
//! Every call to [`hash_password`] draws a fresh random salt, so two hashes of
//! the same plaintext differ; stored hashes must only ever be compared through
//! [`verify_password`], never by string equality.

use anyhow::{anyhow, Result};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};

pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!(e.to_string()))?
        .to_string();
    Ok(phc)
}

/// Verify a plaintext against a PHC string. Malformed hashes verify as false
/// rather than erroring; the digest comparison itself is constant-time.
pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trip() {
        let phc = hash_password("open sesame").unwrap();
        assert!(verify_password(&phc, "open sesame"));
        assert!(!verify_password(&phc, "open sesame!"));
    }

    #[test]
    fn same_plaintext_yields_distinct_hashes() {
        let a = hash_password("1111").unwrap();
        let b = hash_password("1111").unwrap();
        // Fresh salt per call: the encodings differ but both verify.
        assert_ne!(a, b);
        assert!(verify_password(&a, "1111"));
        assert!(verify_password(&b, "1111"));
    }

    #[test]
    fn malformed_hash_is_rejected_not_fatal() {
        assert!(!verify_password("", "whatever"));
        assert!(!verify_password("not-a-phc-string", "whatever"));
        assert!(!verify_password("$argon2id$garbage", "whatever"));
    }
}
