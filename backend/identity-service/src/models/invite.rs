use super::claims::TokenResponse;
use super::role::Role;
use crate::validators::validate_city_code_shape;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Invites expire 15 minutes after creation; not configurable
pub const INVITE_TTL_MINUTES: i64 = 15;

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Admin-provisioning invite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invite {
    pub id: Uuid,
    pub code: String,
    pub role: Role,
    pub municipality_code: String,
    pub created_by_user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub used_by_user_id: Option<Uuid>,
    pub department: Option<String>,
    pub department_id: Option<String>,
}

impl Invite {
    pub fn expiry_for(created_at: DateTime<Utc>) -> DateTime<Utc> {
        created_at + Duration::minutes(INVITE_TTL_MINUTES)
    }

    /// Lifecycle state at `now`; EXPIRED is derived, never stored
    pub fn state_at(&self, now: DateTime<Utc>) -> InviteState {
        if self.used_at.is_some() {
            InviteState::Used
        } else if now >= self.expires_at {
            InviteState::Expired
        } else {
            InviteState::Pending
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InviteState {
    Pending,
    Used,
    Expired,
}

/// Reason reported by `validate_invite`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InviteRejection {
    Invalid,
    Expired,
    Used,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteStatus {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<InviteRejection>,
}

impl InviteStatus {
    pub fn valid(invite: &Invite) -> Self {
        Self {
            valid: true,
            role: Some(invite.role),
            city_code: Some(invite.municipality_code.clone()),
            expires_at: Some(invite.expires_at),
            reason: None,
        }
    }

    pub fn rejected(reason: InviteRejection) -> Self {
        Self {
            valid: false,
            role: None,
            city_code: None,
            expires_at: None,
            reason: Some(reason),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateInviteRequest {
    pub role: Role,
    #[validate(custom(function = "validate_city_code_shape"))]
    pub municipality_code: String,
    #[validate(length(min = 1, max = 120))]
    pub department: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub department_id: Option<String>,
}

/// Returned to the creator; code delivery happens out of band
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteReceipt {
    pub invite_id: Uuid,
    pub code: String,
    pub role: Role,
    pub municipality_code: String,
    pub expires_at: DateTime<Utc>,
    pub invite_link: String,
}

/// Invite as shown in listings; the code is never listed
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteSummary {
    pub id: Uuid,
    pub role: Role,
    pub municipality_code: String,
    pub status: InviteState,
    pub created_by_user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub used_by_user_id: Option<Uuid>,
    pub department: Option<String>,
}

impl InviteSummary {
    pub fn from_invite(invite: Invite, now: DateTime<Utc>) -> Self {
        Self {
            status: invite.state_at(now),
            id: invite.id,
            role: invite.role,
            municipality_code: invite.municipality_code,
            created_by_user_id: invite.created_by_user_id,
            created_at: invite.created_at,
            expires_at: invite.expires_at,
            used_at: invite.used_at,
            used_by_user_id: invite.used_by_user_id,
            department: invite.department,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InviteFilter {
    #[validate(custom(function = "validate_city_code_shape"))]
    pub municipality_code: Option<String>,
    pub role: Option<Role>,
    pub status: Option<InviteState>,
    pub created_by_user_id: Option<Uuid>,
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u32>,
}

impl InviteFilter {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page().saturating_sub(1)) * u64::from(self.limit())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: i64,
}

/// Result of a successful invite acceptance
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleGrantReceipt {
    pub invite_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub municipality_code: String,
    pub tokens: TokenResponse,
}
