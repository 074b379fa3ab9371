//! Shared harness: an `IdentityCore` over in-memory stores with handles kept for inspection

#![allow(dead_code)]

use rescue_identity::config::CoreSettings;
use rescue_identity::core::{CoreStores, IdentityCore};
use rescue_identity::db::memory::{
    InMemoryAuditSink, InMemoryIdentityStore, InMemoryInviteStore, InMemoryMissionStore,
    InMemoryRevocationStore,
};
use rescue_identity::db::IdentityStore;
use rescue_identity::models::{IdentityRecord, Principal, Role};
use jwt_security::test_utils::test_codec;
use std::sync::Arc;

pub struct Harness {
    pub core: Arc<IdentityCore>,
    pub invites: Arc<InMemoryInviteStore>,
    pub missions: Arc<InMemoryMissionStore>,
    pub identities: Arc<InMemoryIdentityStore>,
    pub audit: Arc<InMemoryAuditSink>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(CoreSettings::default())
    }

    pub fn with_settings(settings: CoreSettings) -> Self {
        let invites = Arc::new(InMemoryInviteStore::new());
        let missions = Arc::new(InMemoryMissionStore::new());
        let identities = Arc::new(InMemoryIdentityStore::new());
        let audit = Arc::new(InMemoryAuditSink::new());

        let stores = CoreStores {
            revocations: Arc::new(InMemoryRevocationStore::new()),
            invites: invites.clone(),
            missions: missions.clone(),
            identities: identities.clone(),
            audit: audit.clone(),
        };

        Self {
            core: Arc::new(IdentityCore::new(test_codec(), settings, stores)),
            invites,
            missions,
            identities,
            audit,
        }
    }

    /// Persist an identity and return it as an authenticated principal
    pub async fn seed(&self, external_uid: &str, role: Role, city: Option<&str>) -> Principal {
        let mut record = IdentityRecord::new_citizen(external_uid, city.unwrap_or("NONE"));
        record.role = role;
        record.municipality_code = city.map(str::to_string);
        self.identities
            .create(&record)
            .await
            .expect("seed identity");

        Principal {
            user_id: record.id,
            role,
            city_code: record.municipality_code,
        }
    }
}
