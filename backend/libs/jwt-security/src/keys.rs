//! RSA key material for token signing
//!
//! Access and refresh tokens are signed with separate key pairs. A leaked refresh key must not
//! be able to forge access tokens and the reverse, so [`SigningKeys::new`] refuses identical
//! public keys.

use crate::digest::sha256_hex;
use crate::{JwtError, Result};
use jsonwebtoken::{DecodingKey, EncodingKey};
use tracing::info;

/// Which signing namespace a token belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenUse {
    Access,
    Refresh,
}

impl TokenUse {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenUse::Access => "access",
            TokenUse::Refresh => "refresh",
        }
    }
}

/// Encoding/decoding halves of one RSA key pair
#[derive(Clone)]
pub struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
    /// Short fingerprint of the public key, stamped into the JWT `kid` header
    key_id: String,
}

impl KeyPair {
    /// Parse a PEM private/public pair (PKCS#1 or PKCS#8)
    pub fn from_pem(private_key_pem: &str, public_key_pem: &str) -> Result<Self> {
        let encoding = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| JwtError::InvalidKey(format!("RSA private key: {e}")))?;

        let decoding = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| JwtError::InvalidKey(format!("RSA public key: {e}")))?;

        let fingerprint = sha256_hex(normalize_pem(public_key_pem).as_bytes());

        Ok(Self {
            encoding,
            decoding,
            key_id: fingerprint[..16].to_string(),
        })
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub(crate) fn encoding(&self) -> &EncodingKey {
        &self.encoding
    }

    pub(crate) fn decoding(&self) -> &DecodingKey {
        &self.decoding
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

/// The two signing namespaces used by the platform
#[derive(Debug, Clone)]
pub struct SigningKeys {
    access: KeyPair,
    refresh: KeyPair,
}

impl SigningKeys {
    pub fn new(access: KeyPair, refresh: KeyPair) -> Result<Self> {
        if access.key_id == refresh.key_id {
            return Err(JwtError::InvalidKey(
                "access and refresh tokens must use distinct key material".to_string(),
            ));
        }

        info!(
            access_kid = %access.key_id,
            refresh_kid = %refresh.key_id,
            "JWT signing keys loaded (RS256)"
        );

        Ok(Self { access, refresh })
    }

    pub fn for_use(&self, token_use: TokenUse) -> &KeyPair {
        match token_use {
            TokenUse::Access => &self.access,
            TokenUse::Refresh => &self.refresh,
        }
    }
}

/// PEMs arrive from env vars with inconsistent line endings; fingerprint only the payload
fn normalize_pem(pem: &str) -> String {
    pem.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("-----"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_key_pair_parses_fixture() {
        let pair = KeyPair::from_pem(TEST_ACCESS_PRIVATE_KEY, TEST_ACCESS_PUBLIC_KEY).unwrap();
        assert_eq!(pair.key_id().len(), 16);
    }

    #[test]
    fn test_rejects_invalid_pem() {
        let result = KeyPair::from_pem("not a key", TEST_ACCESS_PUBLIC_KEY);
        assert!(matches!(result, Err(JwtError::InvalidKey(_))));
    }

    #[test]
    fn test_rejects_shared_key_material() {
        let access = KeyPair::from_pem(TEST_ACCESS_PRIVATE_KEY, TEST_ACCESS_PUBLIC_KEY).unwrap();
        let also_access =
            KeyPair::from_pem(TEST_ACCESS_PRIVATE_KEY, TEST_ACCESS_PUBLIC_KEY).unwrap();

        assert!(SigningKeys::new(access, also_access).is_err());
    }

    #[test]
    fn test_key_id_ignores_line_endings() {
        let crlf = TEST_REFRESH_PUBLIC_KEY.replace('\n', "\r\n");
        let a = KeyPair::from_pem(TEST_REFRESH_PRIVATE_KEY, TEST_REFRESH_PUBLIC_KEY).unwrap();
        let b = KeyPair::from_pem(TEST_REFRESH_PRIVATE_KEY, &crlf).unwrap();
        assert_eq!(a.key_id(), b.key_id());
    }
}
