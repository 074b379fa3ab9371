//! Token issuance for every credential kind
//!
//! All timestamps come from the server clock in epoch seconds. Each payload is checked against
//! the scope-requirement rules before it is signed.

use super::permissions::{ensure_city_for_role, ensure_scope_requirement, scopes_for_role};
use crate::config::TokenTtlSettings;
use crate::error::{IdentityError, Result};
use crate::metrics;
use crate::models::claims::DEFAULT_CONTEXT_USAGE;
use crate::models::{
    ActorContext, ActorType, IdentityClaims, Invite, MissionContext, Role, Scope,
    ShareAssignment, TokenPayload, TokenResponse, TokenType, UNKNOWN_CITY,
};
use chrono::Utc;
use jwt_security::JwtCodec;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Input for an authenticated user's token pair
#[derive(Debug, Clone)]
pub struct UserTokenRequest {
    pub user_id: Uuid,
    pub external_uid: Option<String>,
    pub role: Role,
    pub city_code: Option<String>,
    /// `None` resolves the role's default scopes
    pub scopes: Option<Vec<Scope>>,
    pub mission_hint: Option<MissionContext>,
}

#[derive(Debug, Clone)]
pub struct ShareLinkRequest {
    pub incident_id: String,
    pub city_code: String,
    pub expires_in_secs: Option<i64>,
    pub assignment_id: Option<String>,
    pub department_id: Option<String>,
    pub context_usage: Option<String>,
}

/// Signed token together with the payload that was signed
#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub payload: TokenPayload,
}

/// Access + refresh halves of one session
#[derive(Debug, Clone)]
pub struct SignedPair {
    pub access: SignedToken,
    pub refresh: SignedToken,
}

impl SignedPair {
    fn into_response(self, expires_in: i64) -> TokenResponse {
        TokenResponse::bearer(self.access.token, Some(self.refresh.token), expires_in)
    }
}

pub struct TokenIssuer {
    codec: Arc<JwtCodec>,
    ttl: TokenTtlSettings,
}

impl TokenIssuer {
    pub fn new(codec: Arc<JwtCodec>, ttl: TokenTtlSettings) -> Self {
        Self { codec, ttl }
    }

    pub fn ttl(&self) -> &TokenTtlSettings {
        &self.ttl
    }

    pub fn issue_user_token_pair(&self, req: UserTokenRequest) -> Result<TokenResponse> {
        Ok(self.sign_user_pair(req)?.into_response(self.ttl.access_secs))
    }

    pub fn sign_user_pair(&self, req: UserTokenRequest) -> Result<SignedPair> {
        ensure_city_for_role(req.role, req.city_code.as_deref())?;

        let identity = IdentityClaims {
            user_id: req.user_id,
            external_uid: req.external_uid,
            role: req.role,
            scopes: req.scopes.unwrap_or_else(|| scopes_for_role(req.role)),
        };
        let actor = ActorContext {
            actor_type: ActorType::User,
            city_code: req.city_code,
        };

        self.sign_pair_from_claims(Some(identity), actor, req.mission_hint)
    }

    /// Access + refresh pair carrying the same identity/actor/mission claims
    pub fn issue_pair_from_claims(
        &self,
        identity: Option<IdentityClaims>,
        actor: ActorContext,
        mission: Option<MissionContext>,
    ) -> Result<TokenResponse> {
        Ok(self
            .sign_pair_from_claims(identity, actor, mission)?
            .into_response(self.ttl.access_secs))
    }

    pub fn sign_pair_from_claims(
        &self,
        identity: Option<IdentityClaims>,
        actor: ActorContext,
        mission: Option<MissionContext>,
    ) -> Result<SignedPair> {
        let access = self.sign(
            TokenType::Access,
            identity.clone(),
            actor.clone(),
            mission.clone(),
            self.ttl.access_secs,
        )?;
        let refresh = self.sign(
            TokenType::Refresh,
            identity,
            actor,
            mission,
            self.ttl.refresh_secs,
        )?;

        Ok(SignedPair { access, refresh })
    }

    /// Access-only; anonymous sessions are not renewable
    pub fn issue_anon_citizen_token(
        &self,
        city_code: &str,
        scopes: Vec<Scope>,
        sos_id: Option<String>,
    ) -> Result<TokenResponse> {
        let signed = self.sign_anon_citizen(city_code, scopes, sos_id)?;
        Ok(TokenResponse::bearer(
            signed.token,
            None,
            self.ttl.anon_citizen_secs,
        ))
    }

    pub fn sign_anon_citizen(
        &self,
        city_code: &str,
        scopes: Vec<Scope>,
        sos_id: Option<String>,
    ) -> Result<SignedToken> {
        if city_code.trim().is_empty() {
            return Err(IdentityError::Validation(
                "cityCode is required for anonymous citizens".to_string(),
            ));
        }

        let mission = (sos_id.is_some() || !scopes.is_empty()).then(|| MissionContext {
            sos_id,
            scopes,
            ..Default::default()
        });
        let actor = ActorContext {
            actor_type: ActorType::Anon,
            city_code: Some(city_code.to_string()),
        };

        self.sign(
            TokenType::AnonCitizen,
            None,
            actor,
            mission,
            self.ttl.anon_citizen_secs,
        )
    }

    /// Mission-scoped rescuer token; the identity block only carries a correlation id
    pub fn issue_anon_rescuer_mission_token(
        &self,
        sos_id: &str,
        rescuer_mission_id: Option<Uuid>,
        scopes: Vec<Scope>,
        city_code: Option<String>,
        ttl_secs: Option<i64>,
    ) -> Result<SignedToken> {
        if sos_id.trim().is_empty() {
            return Err(IdentityError::Validation("sosId is required".to_string()));
        }
        if scopes.is_empty() || scopes.iter().any(|s| !s.is_mission_permission()) {
            return Err(IdentityError::Validation(
                "rescuer mission scopes must be a non-empty set of mission permissions"
                    .to_string(),
            ));
        }

        let ttl_secs = ttl_secs.unwrap_or(self.ttl.rescuer_mission_secs);
        if ttl_secs <= 0 || ttl_secs > self.ttl.rescuer_mission_max_secs {
            return Err(IdentityError::Validation(format!(
                "rescuer token lifetime must be between 1 and {} seconds",
                self.ttl.rescuer_mission_max_secs
            )));
        }

        let identity = IdentityClaims {
            user_id: Uuid::new_v4(),
            external_uid: None,
            role: Role::Rescuer,
            scopes: Vec::new(),
        };
        let actor = ActorContext {
            actor_type: ActorType::Anon,
            city_code: Some(city_code.unwrap_or_else(|| UNKNOWN_CITY.to_string())),
        };
        let mission = MissionContext {
            sos_id: Some(sos_id.to_string()),
            rescuer_mission_id,
            scopes,
            assignment: None,
        };

        self.sign(
            TokenType::RescuerMission,
            Some(identity),
            actor,
            Some(mission),
            ttl_secs,
        )
    }

    /// Read-only tracking link with a short, explicit expiry
    pub fn issue_share_link_token(&self, req: ShareLinkRequest) -> Result<SignedToken> {
        if req.incident_id.trim().is_empty() {
            return Err(IdentityError::Validation(
                "incidentId is required".to_string(),
            ));
        }

        let ttl_secs = req.expires_in_secs.unwrap_or(self.ttl.share_link_secs);
        if ttl_secs <= 0 || ttl_secs > self.ttl.share_link_max_secs {
            return Err(IdentityError::Validation(format!(
                "share link expiry must be between 1 and {} seconds",
                self.ttl.share_link_max_secs
            )));
        }

        let scopes = scopes_for_role(Role::ShareViewer);
        let identity = IdentityClaims {
            user_id: Uuid::new_v4(),
            external_uid: None,
            role: Role::ShareViewer,
            scopes: scopes.clone(),
        };
        let actor = ActorContext {
            actor_type: ActorType::ShareLink,
            city_code: Some(req.city_code),
        };
        let mission = MissionContext {
            sos_id: Some(req.incident_id.clone()),
            rescuer_mission_id: None,
            scopes,
            assignment: Some(ShareAssignment {
                incident_id: req.incident_id,
                assignment_id: req.assignment_id,
                department_id: req.department_id,
                context_usage: req
                    .context_usage
                    .unwrap_or_else(|| DEFAULT_CONTEXT_USAGE.to_string()),
            }),
        };

        self.sign(
            TokenType::ShareLink,
            Some(identity),
            actor,
            Some(mission),
            ttl_secs,
        )
    }

    /// Proof of a real invite for the registration landing page; expires with the invite
    pub fn issue_admin_registration_token(&self, invite: &Invite) -> Result<SignedToken> {
        let remaining = (invite.expires_at - Utc::now()).num_seconds();
        if remaining <= 0 {
            return Err(IdentityError::InviteExpired);
        }

        // Subject is the invite itself; no user exists yet
        let identity = IdentityClaims {
            user_id: invite.id,
            external_uid: None,
            role: invite.role,
            scopes: vec![Scope::AcceptInvite],
        };
        let actor = ActorContext {
            actor_type: ActorType::System,
            city_code: Some(invite.municipality_code.clone()),
        };

        self.sign(
            TokenType::AdminRegistration,
            Some(identity),
            actor,
            None,
            remaining,
        )
    }

    fn sign(
        &self,
        token_type: TokenType,
        identity: Option<IdentityClaims>,
        actor: ActorContext,
        mission: Option<MissionContext>,
        ttl_secs: i64,
    ) -> Result<SignedToken> {
        let now = Utc::now().timestamp();
        let exp = now
            .checked_add(ttl_secs)
            .filter(|exp| *exp > now)
            .ok_or_else(|| {
                IdentityError::Validation(format!("invalid token lifetime: {}s", ttl_secs))
            })?;
        let payload = TokenPayload {
            iss: self.codec.issuer().to_string(),
            aud: self.codec.audience().to_string(),
            iat: now,
            exp,
            jti: Uuid::new_v4(),
            identity,
            actor,
            mission,
            token_type,
        };

        ensure_scope_requirement(&payload)?;

        let token = self.codec.sign(token_type.token_use(), &payload)?;

        metrics::record_token_issued(token_type.as_str());
        debug!(
            token_type = token_type.as_str(),
            jti = %payload.jti,
            actor = payload.actor.actor_type.as_str(),
            "Token issued"
        );

        Ok(SignedToken { token, payload })
    }
}
