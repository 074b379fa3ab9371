//! Payload inspection without signature verification
//!
//! Only for bookkeeping that must work on tokens we may not be able to verify (revocation of a
//! token signed with the other key namespace, for example). Never trust the result for access
//! decisions.

use crate::{JwtError, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::de::DeserializeOwned;

/// Decode the payload segment of a compact JWT into `T`
pub fn decode_unverified<T: DeserializeOwned>(token: &str) -> Result<T> {
    let parts: Vec<&str> = token.trim().split('.').collect();
    if parts.len() != 3 {
        return Err(JwtError::Malformed("expected three token segments".to_string()));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| JwtError::Malformed(format!("payload is not base64url: {e}")))?;

    serde_json::from_slice(&payload)
        .map_err(|e| JwtError::Malformed(format!("payload is not valid claims JSON: {e}")))
}
