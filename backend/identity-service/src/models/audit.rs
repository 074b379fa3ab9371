use super::role::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    InviteCreated,
    InviteValidated,
    InviteAccepted,
    InviteAcceptFailed,
    MissionCreated,
    MissionRevoked,
    SosMissionsRevoked,
    InvitesPurged,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::InviteCreated => "INVITE_CREATED",
            AuditAction::InviteValidated => "INVITE_VALIDATED",
            AuditAction::InviteAccepted => "INVITE_ACCEPTED",
            AuditAction::InviteAcceptFailed => "INVITE_ACCEPT_FAILED",
            AuditAction::MissionCreated => "MISSION_CREATED",
            AuditAction::MissionRevoked => "MISSION_REVOKED",
            AuditAction::SosMissionsRevoked => "SOS_MISSIONS_REVOKED",
            AuditAction::InvitesPurged => "INVITES_PURGED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditOutcome {
    Success,
    Failure,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::Success => "SUCCESS",
            AuditOutcome::Failure => "FAILURE",
        }
    }
}

/// One privileged action, keyed by the entity it touched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: Uuid,
    pub action: AuditAction,
    pub outcome: AuditOutcome,
    pub actor_user_id: Option<Uuid>,
    /// Role the actor held when acting; unknown when the actor could not be resolved
    pub actor_role: Option<Role>,
    /// `invite`, `mission` or `sos`
    pub entity_type: String,
    pub entity_id: String,
    pub municipality_code: Option<String>,
    pub metadata: Value,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        action: AuditAction,
        outcome: AuditOutcome,
        entity_type: &str,
        entity_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            outcome,
            actor_user_id: None,
            actor_role: None,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.into(),
            municipality_code: None,
            metadata: Value::Null,
            occurred_at: Utc::now(),
        }
    }

    pub fn actor(mut self, user_id: Uuid) -> Self {
        self.actor_user_id = Some(user_id);
        self
    }

    pub fn actor_role(mut self, role: Role) -> Self {
        self.actor_role = Some(role);
        self
    }

    pub fn municipality(mut self, code: impl Into<String>) -> Self {
        self.municipality_code = Some(code.into());
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}
