/// JWT Token Revocation Ledger
///
/// Records explicitly revoked tokens until they would have expired anyway.
///
/// ## Architecture
///
/// - **RevocationLedger**: decodes, hashes and computes the record TTL (this module)
/// - **RevocationStore**: pluggable backend, Redis in production and `db::memory` in tests
///
/// ## Security
///
/// - Token hash prevents token leakage in Redis dumps
/// - TTL prevents unbounded growth of revocation list
use crate::error::{IdentityError, Result};
use crate::models::{RevocationOutcome, RevokedToken};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use jwt_security::{decode_unverified, hash_token};
use redis::aio::ConnectionManager;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Storage backend for revoked-token records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Store `record` for `ttl`; returns `false` if the hash was already present
    async fn insert(&self, record: &RevokedToken, ttl: Duration) -> Result<bool>;

    async fn contains(&self, token_hash: &str) -> Result<bool>;
}

/// Redis-backed store using native key expiry
#[derive(Clone)]
pub struct RedisRevocationStore {
    redis: ConnectionManager,
    key_prefix: String,
}

impl RedisRevocationStore {
    pub fn new(redis: ConnectionManager, key_prefix: impl Into<String>) -> Self {
        Self {
            redis,
            key_prefix: key_prefix.into(),
        }
    }

    fn key(&self, token_hash: &str) -> String {
        format!("{}:revoked:token:{}", self.key_prefix, token_hash)
    }
}

#[async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn insert(&self, record: &RevokedToken, ttl: Duration) -> Result<bool> {
        let value = serde_json::to_string(record)?;
        let ttl_secs = ttl.num_seconds().max(1);

        let mut conn = self.redis.clone();
        // SET NX keeps the first revocation; a reply of nil means it already existed
        let reply: Option<String> = redis::cmd("SET")
            .arg(self.key(&record.token_hash))
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await?;

        Ok(reply.is_some())
    }

    async fn contains(&self, token_hash: &str) -> Result<bool> {
        let mut conn = self.redis.clone();
        let exists: bool = redis::cmd("EXISTS")
            .arg(self.key(token_hash))
            .query_async(&mut conn)
            .await?;

        Ok(exists)
    }
}

/// Claims the ledger needs, read without signature verification
#[derive(Debug, Deserialize)]
struct LedgerClaims {
    exp: Option<i64>,
    jti: Option<Uuid>,
    identity: Option<LedgerIdentity>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerIdentity {
    user_id: Option<Uuid>,
}

pub struct RevocationLedger {
    store: Arc<dyn RevocationStore>,
    /// TTL for tokens that carry no `exp`
    retention: Duration,
}

impl RevocationLedger {
    pub fn new(store: Arc<dyn RevocationStore>, retention: Duration) -> Self {
        Self { store, retention }
    }

    /// Revoke a raw token until its natural expiry
    ///
    /// The signature is not verified: a caller holding the token may always give it up.
    /// Re-revocation is a no-op reported as [`RevocationOutcome::AlreadyRevoked`].
    pub async fn revoke(&self, token: &str) -> Result<RevocationOutcome> {
        let claims: LedgerClaims =
            decode_unverified(token).map_err(|_| IdentityError::InvalidToken)?;
        let now = Utc::now();

        let (expires_at, ttl) = match claims.exp.and_then(timestamp) {
            Some(exp) if exp <= now => {
                debug!(jti = ?claims.jti, "Token already expired, nothing to revoke");
                return Ok(RevocationOutcome::Skipped {
                    reason: "already_expired".to_string(),
                });
            }
            Some(exp) => (exp, exp - now),
            None => (now + self.retention, self.retention),
        };

        let record = RevokedToken {
            token_hash: hash_token(token),
            user_id: claims.identity.and_then(|identity| identity.user_id),
            jti: claims.jti,
            revoked_at: now,
            expires_at,
        };

        if self.store.insert(&record, ttl).await? {
            info!(
                jti = ?record.jti,
                user_id = ?record.user_id,
                ttl_secs = ttl.num_seconds(),
                "Token revoked"
            );
            Ok(RevocationOutcome::Revoked)
        } else {
            Ok(RevocationOutcome::AlreadyRevoked)
        }
    }

    pub async fn is_revoked(&self, token: &str) -> Result<bool> {
        self.store.contains(&hash_token(token)).await
    }
}

fn timestamp(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}
