use super::role::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Locally stored identity for an external identity-provider UID
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    pub id: Uuid,
    pub external_uid: String,
    pub role: Role,
    pub municipality_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IdentityRecord {
    pub fn new_citizen(external_uid: &str, municipality_code: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            external_uid: external_uid.to_string(),
            role: Role::Citizen,
            municipality_code: Some(municipality_code.to_string()),
            created_at: now,
            updated_at: now,
        }
    }
}
