//! In-memory store implementations for tests and local development
//!
//! Concurrency guarantees match the Postgres/Redis stores: conditional updates run while
//! holding the DashMap entry lock, so two racing `mark_used` calls cannot both succeed.

use super::{AuditSink, IdentityStore, InviteStore, MissionStore};
use crate::error::{IdentityError, Result};
use crate::models::{
    AuditEntry, IdentityRecord, Invite, InviteFilter, RescuerMission, RevokedToken, Role,
};
use crate::security::token_revocation::RevocationStore;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct InMemoryRevocationStore {
    records: DashMap<String, (RevokedToken, DateTime<Utc>)>,
}

impl InMemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RevocationStore for InMemoryRevocationStore {
    async fn insert(&self, record: &RevokedToken, ttl: Duration) -> Result<bool> {
        let now = Utc::now();
        let evict_at = now + ttl;

        match self.records.entry(record.token_hash.clone()) {
            Entry::Occupied(mut existing) if existing.get().1 <= now => {
                existing.insert((record.clone(), evict_at));
                Ok(true)
            }
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert((record.clone(), evict_at));
                Ok(true)
            }
        }
    }

    async fn contains(&self, token_hash: &str) -> Result<bool> {
        let now = Utc::now();
        let live = self
            .records
            .get(token_hash)
            .map(|entry| entry.1 > now)
            .unwrap_or(false);

        if !live {
            self.records.remove_if(token_hash, |_, (_, evict_at)| *evict_at <= now);
        }

        Ok(live)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryInviteStore {
    invites: DashMap<Uuid, Invite>,
}

impl InMemoryInviteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InviteStore for InMemoryInviteStore {
    /// Overwrites an existing invite with the same id
    async fn insert(&self, invite: &Invite) -> Result<()> {
        self.invites.insert(invite.id, invite.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Invite>> {
        Ok(self.invites.get(&id).map(|entry| entry.clone()))
    }

    async fn mark_used(&self, id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let Some(mut invite) = self.invites.get_mut(&id) else {
            return Ok(false);
        };

        if invite.used_at.is_some() || invite.expires_at <= now {
            return Ok(false);
        }

        invite.used_at = Some(now);
        invite.used_by_user_id = Some(user_id);
        Ok(true)
    }

    async fn release(&self, id: Uuid, user_id: Uuid) -> Result<bool> {
        let Some(mut invite) = self.invites.get_mut(&id) else {
            return Ok(false);
        };

        if invite.used_by_user_id != Some(user_id) {
            return Ok(false);
        }

        invite.used_at = None;
        invite.used_by_user_id = None;
        Ok(true)
    }

    async fn list(&self, filter: &InviteFilter, now: DateTime<Utc>) -> Result<(Vec<Invite>, i64)> {
        let mut matching: Vec<Invite> = self
            .invites
            .iter()
            .filter(|entry| {
                let invite = entry.value();
                filter
                    .municipality_code
                    .as_ref()
                    .map_or(true, |code| &invite.municipality_code == code)
                    && filter.role.map_or(true, |role| invite.role == role)
                    && filter
                        .created_by_user_id
                        .map_or(true, |creator| invite.created_by_user_id == creator)
                    && filter
                        .status
                        .map_or(true, |status| invite.state_at(now) == status)
            })
            .map(|entry| entry.value().clone())
            .collect();

        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matching.len() as i64;

        let page = matching
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit() as usize)
            .collect();

        Ok((page, total))
    }

    async fn purge_expired(&self, before: DateTime<Utc>) -> Result<u64> {
        let initial = self.invites.len();
        self.invites
            .retain(|_, invite| invite.used_at.is_some() || invite.expires_at >= before);
        Ok((initial - self.invites.len()) as u64)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryMissionStore {
    missions: DashMap<Uuid, RescuerMission>,
}

impl InMemoryMissionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MissionStore for InMemoryMissionStore {
    async fn insert(&self, mission: &RescuerMission) -> Result<()> {
        self.missions.insert(mission.id, mission.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<RescuerMission>> {
        Ok(self.missions.get(&id).map(|entry| entry.clone()))
    }

    async fn revoke(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let Some(mut mission) = self.missions.get_mut(&id) else {
            return Ok(false);
        };

        if mission.revoked_at.is_some() {
            return Ok(false);
        }

        mission.revoked_at = Some(now);
        Ok(true)
    }

    async fn revoke_by_sos(
        &self,
        sos_id: &str,
        municipality_code: &str,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let mut revoked = 0;
        for mut entry in self.missions.iter_mut() {
            let mission = entry.value_mut();
            if mission.sos_id == sos_id
                && mission.municipality_code == municipality_code
                && mission.revoked_at.is_none()
            {
                mission.revoked_at = Some(now);
                revoked += 1;
            }
        }
        Ok(revoked)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    records: DashMap<Uuid, IdentityRecord>,
    by_external_uid: DashMap<String, Uuid>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn find_by_external_uid(&self, external_uid: &str) -> Result<Option<IdentityRecord>> {
        let Some(id) = self.by_external_uid.get(external_uid).map(|entry| *entry) else {
            return Ok(None);
        };
        Ok(self.records.get(&id).map(|entry| entry.clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<IdentityRecord>> {
        Ok(self.records.get(&id).map(|entry| entry.clone()))
    }

    async fn create(&self, record: &IdentityRecord) -> Result<()> {
        match self.by_external_uid.entry(record.external_uid.clone()) {
            Entry::Occupied(_) => Err(IdentityError::IdentityAlreadyExists),
            Entry::Vacant(slot) => {
                slot.insert(record.id);
                self.records.insert(record.id, record.clone());
                Ok(())
            }
        }
    }

    async fn update_role<'a>(
        &self,
        id: Uuid,
        role: Role,
        municipality_code: Option<&'a str>,
    ) -> Result<bool> {
        let Some(mut record) = self.records.get_mut(&id) else {
            return Ok(false);
        };

        record.role = role;
        record.municipality_code = municipality_code.map(str::to_string);
        record.updated_at = Utc::now();
        Ok(true)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn record(&self, entry: &AuditEntry) -> Result<()> {
        self.entries.lock().await.push(entry.clone());
        Ok(())
    }
}
