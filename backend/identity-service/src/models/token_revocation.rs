use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ledger entry for an explicitly revoked token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevokedToken {
    pub token_hash: String,
    /// Absent for tokens without an identity block
    pub user_id: Option<Uuid>,
    pub jti: Option<Uuid>,
    pub revoked_at: DateTime<Utc>,
    /// When the token would naturally expire
    pub expires_at: DateTime<Utc>,
}

/// What `revoke` actually did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RevocationOutcome {
    Revoked,
    AlreadyRevoked,
    Skipped { reason: String },
}

impl RevocationOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, RevocationOutcome::Skipped { .. })
    }
}
