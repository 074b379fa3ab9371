//! JWT signing and verification for the rescue platform
//!
//! **Security Features**:
//! - RS256 only, no symmetric fallback (prevents algorithm confusion)
//! - Distinct key pairs for access and refresh tokens
//! - Issuer and audience pinned at construction
//! - Token digests for revocation bookkeeping
//!
//! The codec is built once at startup from immutable settings and shared by reference; nothing
//! here reads ambient global state.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, Header, Validation};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

pub mod digest;
pub mod inspect;
pub mod keys;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use digest::hash_token;
pub use inspect::decode_unverified;
pub use keys::{KeyPair, SigningKeys, TokenUse};

/// JWT algorithm, RS256 for every token kind
pub const JWT_ALGORITHM: Algorithm = Algorithm::RS256;

const DEFAULT_VALIDATION_LEEWAY: u64 = 30; // 30 seconds clock skew tolerance

pub type Result<T> = std::result::Result<T, JwtError>;

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Failed to sign token: {0}")]
    Signing(String),

    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Token expired")]
    Expired,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid issuer")]
    InvalidIssuer,

    #[error("Invalid audience")]
    InvalidAudience,

    #[error("Missing required claim: {0}")]
    MissingClaim(String),
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => JwtError::InvalidSignature,
            ErrorKind::InvalidIssuer => JwtError::InvalidIssuer,
            ErrorKind::InvalidAudience => JwtError::InvalidAudience,
            ErrorKind::MissingRequiredClaim(claim) => JwtError::MissingClaim(claim.clone()),
            ErrorKind::InvalidRsaKey(msg) => JwtError::InvalidKey(msg.clone()),
            _ => JwtError::Malformed(err.to_string()),
        }
    }
}

/// Signs and verifies compact JWTs against the platform's two key namespaces
pub struct JwtCodec {
    keys: SigningKeys,
    issuer: String,
    audience: String,
    validation: Validation,
}

impl JwtCodec {
    pub fn new(keys: SigningKeys, issuer: &str, audience: &str) -> Self {
        let mut validation = Validation::new(JWT_ALGORITHM);
        validation.validate_exp = true;
        validation.leeway = DEFAULT_VALIDATION_LEEWAY;
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        Self {
            keys,
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            validation,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// `kid` stamped on tokens of this use
    pub fn key_id(&self, token_use: TokenUse) -> &str {
        self.keys.for_use(token_use).key_id()
    }

    /// Sign `claims` with the key pair for `token_use`
    pub fn sign<T: Serialize>(&self, token_use: TokenUse, claims: &T) -> Result<String> {
        let key = self.keys.for_use(token_use);

        let mut header = Header::new(JWT_ALGORITHM);
        header.kid = Some(key.key_id().to_string());

        encode(&header, claims, key.encoding()).map_err(|e| JwtError::Signing(e.to_string()))
    }

    /// Verify signature, issuer, audience and expiry, then decode the claims
    pub fn verify<T: DeserializeOwned>(&self, token_use: TokenUse, token: &str) -> Result<T> {
        let key = self.keys.for_use(token_use);
        let data = decode::<T>(token.trim(), key.decoding(), &self.validation)?;
        Ok(data.claims)
    }
}

impl std::fmt::Debug for JwtCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtCodec")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}
