//! One-way digests of raw tokens
//!
//! Revocation records are keyed by digest so a ledger dump never contains a usable token.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of arbitrary bytes
pub fn sha256_hex(input: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hex::encode(hasher.finalize())
}

/// Digest used as the revocation ledger key for a raw JWT
pub fn hash_token(token: &str) -> String {
    sha256_hex(token.trim().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_consistency() {
        assert_eq!(hash_token("test_token_12345"), hash_token("test_token_12345"));
    }

    #[test]
    fn test_hash_uniqueness() {
        assert_ne!(hash_token("token1"), hash_token("token2"));
    }

    #[test]
    fn test_hash_length() {
        // SHA-256 produces 64 hex characters
        assert_eq!(hash_token("any_token").len(), 64);
    }

    #[test]
    fn test_surrounding_whitespace_ignored() {
        assert_eq!(hash_token(" a.b.c\n"), hash_token("a.b.c"));
    }
}
