/// Persistence for identity service
///
/// Every store is a `Send + Sync` trait object so the core can run over Postgres in
/// production and over the `memory` implementations in tests and local development.
pub mod audit;
pub mod invitations;
pub mod memory;
pub mod missions;
pub mod users;

use crate::error::Result;
use crate::models::{AuditEntry, IdentityRecord, Invite, InviteFilter, RescuerMission, Role};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use audit::PgAuditSink;
pub use invitations::PgInviteStore;
pub use missions::PgMissionStore;
pub use users::PgIdentityStore;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InviteStore: Send + Sync {
    async fn insert(&self, invite: &Invite) -> Result<()>;

    async fn find(&self, id: Uuid) -> Result<Option<Invite>>;

    /// Atomically mark an invite used.
    ///
    /// Succeeds only while the invite is unused and unexpired at `now`; returns `false` when
    /// another caller won the race or the invite lapsed.
    async fn mark_used(&self, id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> Result<bool>;

    /// Reverts `mark_used` for `user_id`; false when the invite is not held by that user
    async fn release(&self, id: Uuid, user_id: Uuid) -> Result<bool>;

    /// Page of invites matching `filter`, newest first, plus the total match count
    async fn list(&self, filter: &InviteFilter, now: DateTime<Utc>) -> Result<(Vec<Invite>, i64)>;

    /// Delete unused invites that expired before `before`
    async fn purge_expired(&self, before: DateTime<Utc>) -> Result<u64>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MissionStore: Send + Sync {
    async fn insert(&self, mission: &RescuerMission) -> Result<()>;

    async fn find(&self, id: Uuid) -> Result<Option<RescuerMission>>;

    /// Returns `false` if the mission was already revoked
    async fn revoke(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool>;

    /// Revoke every live mission for an SOS within one municipality
    async fn revoke_by_sos(
        &self,
        sos_id: &str,
        municipality_code: &str,
        now: DateTime<Utc>,
    ) -> Result<u64>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_external_uid(&self, external_uid: &str) -> Result<Option<IdentityRecord>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<IdentityRecord>>;

    /// Fails with `IdentityAlreadyExists` on a duplicate external UID
    async fn create(&self, record: &IdentityRecord) -> Result<()>;

    /// Returns `false` if no such identity
    async fn update_role<'a>(
        &self,
        id: Uuid,
        role: Role,
        municipality_code: Option<&'a str>,
    ) -> Result<bool>;
}

/// Destination for audit records; callers treat writes as fire-and-forget
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: &AuditEntry) -> Result<()>;
}
