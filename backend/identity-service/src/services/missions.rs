//! Incident-scoped rescuer missions
//!
//! The JWT decides when a mission token expires. The mission store decides only whether it
//! was revoked early, so `verify_mission` rejects a revoked mission even while its signature
//! and `exp` are still good. Revoking a mission does not touch the revocation ledger.

use super::audit::AuditTrail;
use super::authority::ensure_can_manage_missions;
use crate::db::MissionStore;
use crate::error::{IdentityError, Result};
use crate::models::{
    AuditAction, AuditEntry, AuditOutcome, CreateMissionRequest, MissionClaims, MissionToken,
    Principal, RescuerMission, TokenType,
};
use crate::security::issuer::TokenIssuer;
use crate::security::permissions::normalize_mission_permissions;
use crate::security::validator::TokenValidator;
use chrono::Utc;
use jwt_security::TokenUse;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

pub struct MissionService {
    missions: Arc<dyn MissionStore>,
    issuer: Arc<TokenIssuer>,
    validator: Arc<TokenValidator>,
    audit: AuditTrail,
}

impl MissionService {
    pub fn new(
        missions: Arc<dyn MissionStore>,
        issuer: Arc<TokenIssuer>,
        validator: Arc<TokenValidator>,
        audit: AuditTrail,
    ) -> Self {
        Self {
            missions,
            issuer,
            validator,
            audit,
        }
    }

    pub async fn create_mission(
        &self,
        creator: &Principal,
        req: CreateMissionRequest,
    ) -> Result<MissionToken> {
        let result = self.try_create(creator, req.clone()).await;

        let entry = match &result {
            Ok(mission) => AuditEntry::new(
                AuditAction::MissionCreated,
                AuditOutcome::Success,
                "mission",
                mission.mission_id.to_string(),
            )
            .municipality(mission.municipality_code.clone())
            .metadata(json!({
                "sosId": mission.sos_id,
                "permissions": mission.permissions,
                "expiresAt": mission.expires_at,
            })),
            Err(e) => AuditEntry::new(
                AuditAction::MissionCreated,
                AuditOutcome::Failure,
                "sos",
                req.sos_id.clone(),
            )
            .metadata(json!({ "error": e.code(), "creatorRole": creator.role })),
        };
        self.audit
            .emit(entry.actor(creator.user_id).actor_role(creator.role))
            .await;

        result
    }

    async fn try_create(
        &self,
        creator: &Principal,
        req: CreateMissionRequest,
    ) -> Result<MissionToken> {
        req.validate()?;

        let municipality_code = req
            .municipality_code
            .or_else(|| creator.city_code.clone())
            .ok_or_else(|| IdentityError::Validation("municipalityCode is required".to_string()))?;
        ensure_can_manage_missions(creator, &municipality_code)?;

        let permissions = normalize_mission_permissions(req.permissions)?;
        let ttl_secs = i64::from(req.ttl_minutes) * 60;
        let mission_id = Uuid::new_v4();

        let signed = self.issuer.issue_anon_rescuer_mission_token(
            &req.sos_id,
            Some(mission_id),
            permissions.clone(),
            Some(municipality_code.clone()),
            Some(ttl_secs),
        )?;

        let now = Utc::now();
        let mission = RescuerMission {
            id: mission_id,
            sos_id: req.sos_id,
            municipality_code,
            token: signed.token,
            expires_at: signed.payload.expires_at(),
            permissions,
            created_by_user_id: creator.user_id,
            created_by_role: creator.role,
            created_at: now,
            revoked_at: None,
        };
        self.missions.insert(&mission).await?;

        info!(
            mission_id = %mission.id,
            sos_id = %mission.sos_id,
            municipality_code = %mission.municipality_code,
            ttl_secs,
            "Rescuer mission created"
        );

        Ok(MissionToken {
            mission_id: mission.id,
            sos_id: mission.sos_id,
            municipality_code: mission.municipality_code,
            token: mission.token,
            permissions: mission.permissions,
            expires_at: mission.expires_at,
        })
    }

    pub async fn verify_mission(&self, token: &str) -> Result<MissionClaims> {
        let payload = self
            .validator
            .validate(token, TokenUse::Access)
            .await
            .into_result()?;

        if payload.token_type != TokenType::RescuerMission {
            return Err(IdentityError::InvalidToken);
        }

        let mission_ctx = payload.mission.as_ref().ok_or(IdentityError::InvalidToken)?;
        let mission_id = mission_ctx
            .rescuer_mission_id
            .ok_or(IdentityError::InvalidToken)?;

        let mission = self
            .missions
            .find(mission_id)
            .await?
            .ok_or(IdentityError::MissionNotFound)?;

        if mission.is_revoked() {
            info!(mission_id = %mission.id, "Rejected token for revoked mission");
            return Err(IdentityError::MissionRevoked);
        }

        Ok(MissionClaims {
            mission_id: mission.id,
            sos_id: mission.sos_id,
            municipality_code: mission.municipality_code,
            permissions: mission_ctx.scopes.clone(),
            rescuer_ref: payload.subject_id(),
            expires_at: payload.expires_at(),
        })
    }

    /// Idempotent; returns `false` if the mission was already revoked
    pub async fn revoke_mission(&self, principal: &Principal, mission_id: Uuid) -> Result<bool> {
        let result = self.try_revoke(principal, mission_id).await;

        let entry = AuditEntry::new(
            AuditAction::MissionRevoked,
            if result.is_ok() {
                AuditOutcome::Success
            } else {
                AuditOutcome::Failure
            },
            "mission",
            mission_id.to_string(),
        )
        .actor(principal.user_id)
        .actor_role(principal.role)
        .metadata(match &result {
            Ok(changed) => json!({ "alreadyRevoked": !changed }),
            Err(e) => json!({ "error": e.code() }),
        });
        self.audit.emit(entry).await;

        result
    }

    async fn try_revoke(&self, principal: &Principal, mission_id: Uuid) -> Result<bool> {
        let mission = self
            .missions
            .find(mission_id)
            .await?
            .ok_or(IdentityError::MissionNotFound)?;
        ensure_can_manage_missions(principal, &mission.municipality_code)?;

        let changed = self.missions.revoke(mission_id, Utc::now()).await?;
        if changed {
            info!(mission_id = %mission_id, sos_id = %mission.sos_id, "Rescuer mission revoked");
        }
        Ok(changed)
    }

    /// Revoke every live mission for an SOS in the caller's municipality
    pub async fn revoke_sos_missions(&self, principal: &Principal, sos_id: &str) -> Result<u64> {
        let result = self.try_revoke_sos(principal, sos_id).await;

        let mut entry = AuditEntry::new(
            AuditAction::SosMissionsRevoked,
            if result.is_ok() {
                AuditOutcome::Success
            } else {
                AuditOutcome::Failure
            },
            "sos",
            sos_id,
        )
        .actor(principal.user_id)
        .actor_role(principal.role)
        .metadata(match &result {
            Ok(revoked) => json!({ "revoked": revoked }),
            Err(e) => json!({ "error": e.code() }),
        });
        if let Some(city) = &principal.city_code {
            entry = entry.municipality(city.clone());
        }
        self.audit.emit(entry).await;

        result
    }

    async fn try_revoke_sos(&self, principal: &Principal, sos_id: &str) -> Result<u64> {
        if sos_id.trim().is_empty() {
            return Err(IdentityError::Validation("sosId is required".to_string()));
        }

        let municipality_code = principal.city_code.clone().ok_or_else(|| {
            IdentityError::Forbidden("caller has no municipality".to_string())
        })?;
        ensure_can_manage_missions(principal, &municipality_code)?;

        let revoked = self
            .missions
            .revoke_by_sos(sos_id, &municipality_code, Utc::now())
            .await?;

        if revoked == 0 {
            warn!(sos_id = %sos_id, municipality_code = %municipality_code, "No live missions to revoke");
        } else {
            info!(sos_id = %sos_id, revoked, "SOS missions revoked");
        }
        Ok(revoked)
    }
}
