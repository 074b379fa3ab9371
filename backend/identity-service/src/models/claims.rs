//! Token payload shape shared by every token kind
//!
//! The payload is a closed structure: `tokenType` is the tag, `actor` is always present, and
//! `identity`/`mission` are independently optional. Unknown token types, roles, or scopes fail
//! deserialization, so a payload that decodes is a payload this service could have issued.

use super::role::{Role, Scope};
use crate::error::{IdentityError, Result};
use chrono::{DateTime, TimeZone, Utc};
use jwt_security::TokenUse;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Placeholder municipality for cross-tenant anonymous rescuer bootstrap
pub const UNKNOWN_CITY: &str = "UNKNOWN";

/// Default `contextUsage` for share-link assignments
pub const DEFAULT_CONTEXT_USAGE: &str = "tracking";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityClaims {
    pub user_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_uid: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub scopes: Vec<Scope>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorType {
    User,
    Anon,
    System,
    ShareLink,
}

impl ActorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorType::User => "USER",
            ActorType::Anon => "ANON",
            ActorType::System => "SYSTEM",
            ActorType::ShareLink => "SHARE_LINK",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorContext {
    #[serde(rename = "type")]
    pub actor_type: ActorType,
    /// `None` only for platform admins
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareAssignment {
    pub incident_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department_id: Option<String>,
    pub context_usage: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sos_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rescuer_mission_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<Scope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment: Option<ShareAssignment>,
}

/// Closed set of token kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
    AnonCitizen,
    RescuerMission,
    ShareLink,
    AdminRegistration,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
            TokenType::AnonCitizen => "anon_citizen",
            TokenType::RescuerMission => "rescuer_mission",
            TokenType::ShareLink => "share_link",
            TokenType::AdminRegistration => "admin_registration",
        }
    }

    /// Signing namespace; only refresh tokens use the refresh key
    pub fn token_use(&self) -> TokenUse {
        match self {
            TokenType::Refresh => TokenUse::Refresh,
            _ => TokenUse::Access,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPayload {
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<IdentityClaims>,
    pub actor: ActorContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mission: Option<MissionContext>,
    pub token_type: TokenType,
}

impl TokenPayload {
    /// Union of identity and mission scopes
    pub fn effective_scopes(&self) -> Vec<Scope> {
        let mut scopes = BTreeSet::new();
        if let Some(identity) = &self.identity {
            scopes.extend(identity.scopes.iter().copied());
        }
        if let Some(mission) = &self.mission {
            scopes.extend(mission.scopes.iter().copied());
        }
        scopes.into_iter().collect()
    }

    pub fn has_scope(&self, scope: Scope) -> bool {
        self.identity
            .as_ref()
            .is_some_and(|identity| identity.scopes.contains(&scope))
            || self
                .mission
                .as_ref()
                .is_some_and(|mission| mission.scopes.contains(&scope))
    }

    pub fn role(&self) -> Option<Role> {
        self.identity.as_ref().map(|identity| identity.role)
    }

    pub fn subject_id(&self) -> Option<Uuid> {
        self.identity.as_ref().map(|identity| identity.user_id)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Issued credential; `refreshToken` is absent for non-renewable kinds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub token_type: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String, refresh_token: Option<String>, expires_in: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_in,
            token_type: "Bearer".to_string(),
        }
    }
}

/// Authenticated caller of a privileged operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
    pub city_code: Option<String>,
}

impl Principal {
    /// Only user access tokens identify a principal
    pub fn from_payload(payload: &TokenPayload) -> Result<Self> {
        if payload.token_type != TokenType::Access || payload.actor.actor_type != ActorType::User {
            return Err(IdentityError::Forbidden(format!(
                "{} tokens cannot authorize this operation",
                payload.token_type.as_str()
            )));
        }

        let identity = payload.identity.as_ref().ok_or(IdentityError::InvalidToken)?;

        Ok(Self {
            user_id: identity.user_id,
            role: identity.role,
            city_code: payload.actor.city_code.clone(),
        })
    }

    pub fn in_city(&self, city_code: &str) -> bool {
        self.city_code.as_deref() == Some(city_code)
    }
}

/// Why a token failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationFailure {
    Revoked,
    Expired,
    InvalidSignature,
    InvalidIssuer,
    InvalidAudience,
    Malformed,
    WrongTokenType,
    RevocationUnavailable,
}

impl ValidationFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationFailure::Revoked => "revoked",
            ValidationFailure::Expired => "expired",
            ValidationFailure::InvalidSignature => "invalid_signature",
            ValidationFailure::InvalidIssuer => "invalid_issuer",
            ValidationFailure::InvalidAudience => "invalid_audience",
            ValidationFailure::Malformed => "malformed",
            ValidationFailure::WrongTokenType => "wrong_token_type",
            ValidationFailure::RevocationUnavailable => "revocation_unavailable",
        }
    }
}

impl From<ValidationFailure> for IdentityError {
    fn from(failure: ValidationFailure) -> Self {
        match failure {
            ValidationFailure::Revoked => IdentityError::TokenRevoked,
            ValidationFailure::Expired => IdentityError::TokenExpired,
            ValidationFailure::RevocationUnavailable => {
                IdentityError::Internal("revocation ledger unavailable".to_string())
            }
            _ => IdentityError::InvalidToken,
        }
    }
}

/// Soft validation outcome; a bad token is an expected result, not an error
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<TokenPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ValidationFailure>,
}

impl ValidationResult {
    pub fn ok(payload: TokenPayload) -> Self {
        Self {
            valid: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn failed(reason: ValidationFailure) -> Self {
        Self {
            valid: false,
            payload: None,
            error: Some(reason),
        }
    }

    pub fn into_result(self) -> std::result::Result<TokenPayload, ValidationFailure> {
        match (self.payload, self.error) {
            (Some(payload), None) => Ok(payload),
            (_, Some(reason)) => Err(reason),
            (None, None) => Err(ValidationFailure::Malformed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> TokenPayload {
        TokenPayload {
            iss: "issuer".to_string(),
            aud: "audience".to_string(),
            iat: 1_700_000_000,
            exp: 1_700_000_900,
            jti: Uuid::new_v4(),
            identity: Some(IdentityClaims {
                user_id: Uuid::new_v4(),
                external_uid: Some("firebase-uid-1".to_string()),
                role: Role::Rescuer,
                scopes: vec![Scope::ViewSos, Scope::RespondToSos],
            }),
            actor: ActorContext {
                actor_type: ActorType::User,
                city_code: Some("QC".to_string()),
            },
            mission: Some(MissionContext {
                sos_id: Some("sos-42".to_string()),
                scopes: vec![Scope::ViewSos, Scope::SendLocation],
                ..Default::default()
            }),
            token_type: TokenType::Access,
        }
    }

    #[test]
    fn test_payload_wire_names() {
        let value = serde_json::to_value(sample_payload()).unwrap();
        assert_eq!(value["tokenType"], "access");
        assert_eq!(value["actor"]["type"], "USER");
        assert_eq!(value["actor"]["cityCode"], "QC");
        assert_eq!(value["identity"]["externalUid"], "firebase-uid-1");
        assert_eq!(value["mission"]["sosId"], "sos-42");
    }

    #[test]
    fn test_unknown_token_type_rejected() {
        let mut value = serde_json::to_value(sample_payload()).unwrap();
        value["tokenType"] = serde_json::json!("super_token");
        assert!(serde_json::from_value::<TokenPayload>(value).is_err());
    }

    #[test]
    fn test_effective_scopes_merge_without_duplicates() {
        let scopes = sample_payload().effective_scopes();
        assert_eq!(
            scopes,
            vec![Scope::RespondToSos, Scope::ViewSos, Scope::SendLocation]
        );
    }

    #[test]
    fn test_principal_requires_user_access_token() {
        let payload = sample_payload();
        let principal = Principal::from_payload(&payload).unwrap();
        assert_eq!(principal.role, Role::Rescuer);
        assert!(principal.in_city("QC"));

        let mut refresh = payload.clone();
        refresh.token_type = TokenType::Refresh;
        assert!(Principal::from_payload(&refresh).is_err());

        let mut anon = payload;
        anon.actor.actor_type = ActorType::Anon;
        assert!(Principal::from_payload(&anon).is_err());
    }

    #[test]
    fn test_only_refresh_uses_refresh_key() {
        assert_eq!(TokenType::Refresh.token_use(), TokenUse::Refresh);
        assert_eq!(TokenType::ShareLink.token_use(), TokenUse::Access);
    }
}
