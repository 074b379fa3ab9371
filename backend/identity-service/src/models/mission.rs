use super::role::{Role, Scope};
use crate::validators::validate_city_code_shape;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub const MAX_MISSION_TTL_MINUTES: u32 = 1440;

/// Incident-scoped rescuer grant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescuerMission {
    pub id: Uuid,
    pub sos_id: String,
    pub municipality_code: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub permissions: Vec<Scope>,
    pub created_by_user_id: Uuid,
    pub created_by_role: Role,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl RescuerMission {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMissionRequest {
    #[validate(length(min = 1, max = 128))]
    pub sos_id: String,
    /// Defaults to the creator's municipality
    #[validate(custom(function = "validate_city_code_shape"))]
    pub municipality_code: Option<String>,
    #[validate(range(min = 1, max = 1440))]
    pub ttl_minutes: u32,
    /// Defaults to every mission permission
    pub permissions: Option<Vec<Scope>>,
}

/// Token plus metadata returned to the mission creator
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionToken {
    pub mission_id: Uuid,
    pub sos_id: String,
    pub municipality_code: String,
    pub token: String,
    pub permissions: Vec<Scope>,
    pub expires_at: DateTime<Utc>,
}

/// Claims of a verified, live mission token
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionClaims {
    pub mission_id: Uuid,
    pub sos_id: String,
    pub municipality_code: String,
    pub permissions: Vec<Scope>,
    pub rescuer_ref: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
}
