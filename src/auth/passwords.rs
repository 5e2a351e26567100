//! Credential hashing
//!
//! One-way, salted hashing shared by account passwords and one-time codes.
//! The work factor comes from configuration (default cost 12).

use bcrypt::{hash, verify};

pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// Hash a secret with the given bcrypt cost.
pub fn hash_secret(secret: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    hash(secret, cost)
}

/// Verify a secret against a stored hash.
///
/// Any failure (wrong secret, malformed hash) is reported as a plain `false`
/// so callers cannot distinguish the cases.
pub fn verify_secret(secret: &str, hashed: &str) -> bool {
    verify(secret, hashed).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Low cost keeps the tests fast; production uses the configured cost.
    const TEST_COST: u32 = 4;

    #[test]
    fn test_hash_and_verify_round_trip() {
        let hashed = hash_secret("Str0ng!Pass#1", TEST_COST).unwrap();
        assert_ne!(hashed, "Str0ng!Pass#1");
        assert!(verify_secret("Str0ng!Pass#1", &hashed));
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let hashed = hash_secret("Str0ng!Pass#1", TEST_COST).unwrap();
        assert!(!verify_secret("Str0ng!Pass#2", &hashed));
        assert!(!verify_secret("", &hashed));
    }

    #[test]
    fn test_verify_malformed_hash_is_plain_false() {
        assert!(!verify_secret("anything", "not-a-bcrypt-hash"));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_secret("same-secret", TEST_COST).unwrap();
        let b = hash_secret("same-secret", TEST_COST).unwrap();
        assert_ne!(a, b);
        assert!(verify_secret("same-secret", &a));
        assert!(verify_secret("same-secret", &b));
    }
}
