//! Identity core
//!
//! One entry point per exposed operation. Adapters (HTTP, tests) talk to [`IdentityCore`] only;
//! everything below it is wired here from injected stores and immutable settings.

use crate::config::CoreSettings;
use crate::db::memory::{
    InMemoryAuditSink, InMemoryIdentityStore, InMemoryInviteStore, InMemoryMissionStore,
    InMemoryRevocationStore,
};
use crate::db::{AuditSink, IdentityStore, InviteStore, MissionStore};
use crate::error::{IdentityError, Result};
use crate::models::{
    CreateInviteRequest, CreateMissionRequest, IdentityRecord, InviteFilter, InviteReceipt,
    InviteStatus, InviteSummary, MissionClaims, MissionContext, MissionToken, Page, Principal,
    RevocationOutcome, Role, RoleGrantReceipt, Scope, TokenResponse, ValidationResult,
};
use crate::security::issuer::{ShareLinkRequest, SignedToken, TokenIssuer, UserTokenRequest};
use crate::security::permissions::{normalize_mission_permissions, scopes_for_role};
use crate::security::refresh::{RefreshCoordinator, RefreshResult};
use crate::security::token_revocation::{RevocationLedger, RevocationStore};
use crate::security::validator::TokenValidator;
use crate::services::{AuditTrail, InviteService, MissionService};
use chrono::Duration;
use jwt_security::{JwtCodec, TokenUse};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Backing stores for the core
#[derive(Clone)]
pub struct CoreStores {
    pub revocations: Arc<dyn RevocationStore>,
    pub invites: Arc<dyn InviteStore>,
    pub missions: Arc<dyn MissionStore>,
    pub identities: Arc<dyn IdentityStore>,
    pub audit: Arc<dyn AuditSink>,
}

impl CoreStores {
    pub fn in_memory() -> Self {
        Self {
            revocations: Arc::new(InMemoryRevocationStore::new()),
            invites: Arc::new(InMemoryInviteStore::new()),
            missions: Arc::new(InMemoryMissionStore::new()),
            identities: Arc::new(InMemoryIdentityStore::new()),
            audit: Arc::new(InMemoryAuditSink::new()),
        }
    }
}

/// Input to `IssueToken`, one variant per token context
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum IssueTokenRequest {
    /// Login by an externally authenticated user; unknown UIDs are provisioned as citizens
    User {
        external_uid: String,
        city_code: Option<String>,
        sos_id: Option<String>,
    },
    AnonCitizen {
        city_code: String,
        #[serde(default)]
        scopes: Vec<Scope>,
        sos_id: Option<String>,
    },
    AnonRescuer {
        sos_id: String,
        scopes: Option<Vec<Scope>>,
        city_code: Option<String>,
        ttl_secs: Option<i64>,
    },
    ShareLink {
        incident_id: String,
        city_code: String,
        expires_in_secs: Option<i64>,
        assignment_id: Option<String>,
        department_id: Option<String>,
        context_usage: Option<String>,
    },
}

pub struct IdentityCore {
    issuer: Arc<TokenIssuer>,
    validator: Arc<TokenValidator>,
    ledger: Arc<RevocationLedger>,
    refresh: RefreshCoordinator,
    invites: InviteService,
    missions: MissionService,
    identities: Arc<dyn IdentityStore>,
}

impl IdentityCore {
    pub fn new(codec: JwtCodec, settings: CoreSettings, stores: CoreStores) -> Self {
        let codec = Arc::new(codec);
        let ledger = Arc::new(RevocationLedger::new(
            stores.revocations,
            Duration::seconds(settings.revocation.retention_secs),
        ));
        let validator = Arc::new(TokenValidator::new(
            codec.clone(),
            ledger.clone(),
            &settings.revocation,
        ));
        let issuer = Arc::new(TokenIssuer::new(codec, settings.tokens));
        let audit = AuditTrail::new(stores.audit);

        Self {
            refresh: RefreshCoordinator::new(validator.clone(), issuer.clone(), ledger.clone()),
            invites: InviteService::new(
                stores.invites,
                stores.identities.clone(),
                issuer.clone(),
                audit.clone(),
                settings.invites,
            ),
            missions: MissionService::new(
                stores.missions,
                issuer.clone(),
                validator.clone(),
                audit,
            ),
            identities: stores.identities,
            issuer,
            validator,
            ledger,
        }
    }

    /// Resolve the caller of a privileged operation from a user access token
    pub async fn authenticate(&self, access_token: &str) -> Result<Principal> {
        if access_token.trim().is_empty() {
            return Err(IdentityError::MissingCredentials);
        }

        let payload = self
            .validator
            .validate(access_token, TokenUse::Access)
            .await
            .into_result()?;

        Principal::from_payload(&payload)
    }

    pub async fn issue_token(
        &self,
        caller: Option<&Principal>,
        req: IssueTokenRequest,
    ) -> Result<TokenResponse> {
        match req {
            IssueTokenRequest::User {
                external_uid,
                city_code,
                sos_id,
            } => self.issue_user_login(&external_uid, city_code, sos_id).await,

            IssueTokenRequest::AnonCitizen {
                city_code,
                scopes,
                sos_id,
            } => {
                let allowed = scopes_for_role(Role::Citizen);
                if let Some(bad) = scopes.iter().find(|s| !allowed.contains(s)) {
                    return Err(IdentityError::Validation(format!(
                        "{} is not available to anonymous citizens",
                        bad
                    )));
                }
                self.issuer
                    .issue_anon_citizen_token(&city_code, scopes, sos_id)
            }

            IssueTokenRequest::AnonRescuer {
                sos_id,
                scopes,
                city_code,
                ttl_secs,
            } => {
                let caller = caller.ok_or(IdentityError::MissingCredentials)?;
                if !matches!(
                    caller.role,
                    Role::AppAdmin | Role::CityAdmin | Role::SosAdmin
                ) {
                    return Err(IdentityError::Forbidden(format!(
                        "{} cannot issue rescuer tokens",
                        caller.role
                    )));
                }

                let city_code = city_code.or_else(|| caller.city_code.clone());
                if !caller.role.is_platform_admin()
                    && !city_code.as_deref().is_some_and(|city| caller.in_city(city))
                {
                    return Err(IdentityError::Forbidden(
                        "rescuer tokens are limited to the caller's municipality".to_string(),
                    ));
                }

                let signed = self.issuer.issue_anon_rescuer_mission_token(
                    &sos_id,
                    None,
                    normalize_mission_permissions(scopes)?,
                    city_code,
                    ttl_secs,
                )?;
                Ok(single(signed))
            }

            IssueTokenRequest::ShareLink {
                incident_id,
                city_code,
                expires_in_secs,
                assignment_id,
                department_id,
                context_usage,
            } => {
                let caller = caller.ok_or(IdentityError::MissingCredentials)?;
                if !caller.role.is_platform_admin() && !caller.in_city(&city_code) {
                    return Err(IdentityError::Forbidden(
                        "share links are limited to the caller's municipality".to_string(),
                    ));
                }

                let signed = self.issuer.issue_share_link_token(ShareLinkRequest {
                    incident_id,
                    city_code,
                    expires_in_secs,
                    assignment_id,
                    department_id,
                    context_usage,
                })?;
                Ok(single(signed))
            }
        }
    }

    async fn issue_user_login(
        &self,
        external_uid: &str,
        city_code: Option<String>,
        sos_id: Option<String>,
    ) -> Result<TokenResponse> {
        if external_uid.trim().is_empty() {
            return Err(IdentityError::Validation("externalUid is required".to_string()));
        }

        let record = match self.identities.find_by_external_uid(external_uid).await? {
            Some(record) => record,
            None => {
                let city = city_code.as_deref().ok_or_else(|| {
                    IdentityError::Validation("cityCode is required for new users".to_string())
                })?;
                let record = IdentityRecord::new_citizen(external_uid, city);
                match self.identities.create(&record).await {
                    Ok(()) => {
                        info!(user_id = %record.id, "Provisioned citizen identity");
                        record
                    }
                    // Concurrent first login; use the winner's record
                    Err(IdentityError::IdentityAlreadyExists) => self
                        .identities
                        .find_by_external_uid(external_uid)
                        .await?
                        .ok_or(IdentityError::UserNotFound)?,
                    Err(e) => return Err(e),
                }
            }
        };

        self.issuer.issue_user_token_pair(UserTokenRequest {
            user_id: record.id,
            external_uid: Some(record.external_uid),
            role: record.role,
            city_code: record.municipality_code,
            scopes: None,
            mission_hint: sos_id.map(|sos_id| MissionContext {
                sos_id: Some(sos_id),
                ..Default::default()
            }),
        })
    }

    pub async fn validate_token(&self, token: &str, expected_use: TokenUse) -> ValidationResult {
        self.validator.validate(token, expected_use).await
    }

    pub async fn refresh_token(
        &self,
        refresh_token: &str,
        sos_id_override: Option<String>,
    ) -> Result<RefreshResult> {
        self.refresh.refresh(refresh_token, sos_id_override).await
    }

    pub async fn revoke_token(&self, token: &str) -> Result<RevocationOutcome> {
        self.ledger.revoke(token).await
    }

    pub async fn create_invite(
        &self,
        creator: &Principal,
        req: CreateInviteRequest,
    ) -> Result<InviteReceipt> {
        self.invites.create_invite(creator, req).await
    }

    pub async fn validate_invite(&self, invite_id: &str) -> InviteStatus {
        self.invites.validate_invite(invite_id).await
    }

    pub async fn accept_invite(
        &self,
        caller: &Principal,
        invite_id: Uuid,
        code: &str,
    ) -> Result<RoleGrantReceipt> {
        self.invites
            .accept_invite(invite_id, code, caller.user_id)
            .await
    }

    pub async fn list_invites(
        &self,
        requester: &Principal,
        filter: InviteFilter,
    ) -> Result<Page<InviteSummary>> {
        self.invites.list_invites(requester, filter).await
    }

    pub async fn purge_stale_invites(&self) -> Result<u64> {
        self.invites.purge_stale_invites().await
    }

    pub async fn create_mission(
        &self,
        creator: &Principal,
        req: CreateMissionRequest,
    ) -> Result<MissionToken> {
        self.missions.create_mission(creator, req).await
    }

    pub async fn verify_mission(&self, token: &str) -> Result<MissionClaims> {
        self.missions.verify_mission(token).await
    }

    pub async fn revoke_mission(&self, caller: &Principal, mission_id: Uuid) -> Result<bool> {
        self.missions.revoke_mission(caller, mission_id).await
    }

    pub async fn revoke_sos_missions(&self, caller: &Principal, sos_id: &str) -> Result<u64> {
        self.missions.revoke_sos_missions(caller, sos_id).await
    }
}

fn single(signed: SignedToken) -> TokenResponse {
    let expires_in = signed.payload.exp - signed.payload.iat;
    TokenResponse::bearer(signed.token, None, expires_in)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jwt_security::test_utils::test_codec;
    use serde_json::json;

    fn core() -> IdentityCore {
        IdentityCore::new(test_codec(), CoreSettings::default(), CoreStores::in_memory())
    }

    #[test]
    fn test_issue_request_wire_format() {
        let req: IssueTokenRequest = serde_json::from_value(json!({
            "kind": "ANON_CITIZEN",
            "cityCode": "QC"
        }))
        .unwrap();
        assert!(matches!(req, IssueTokenRequest::AnonCitizen { ref city_code, .. } if city_code == "QC"));

        let req: IssueTokenRequest = serde_json::from_value(json!({
            "kind": "USER",
            "externalUid": "idp-1",
            "cityCode": "QC"
        }))
        .unwrap();
        assert!(matches!(req, IssueTokenRequest::User { .. }));
    }

    #[tokio::test]
    async fn test_first_login_provisions_citizen() {
        let core = core();
        let req = IssueTokenRequest::User {
            external_uid: "idp-42".to_string(),
            city_code: Some("QC".to_string()),
            sos_id: None,
        };

        let first = core.issue_token(None, req.clone()).await.unwrap();
        let principal = core.authenticate(&first.access_token).await.unwrap();
        assert_eq!(principal.role, Role::Citizen);
        assert_eq!(principal.city_code.as_deref(), Some("QC"));

        // Same identity on the next login
        let second = core.issue_token(None, req).await.unwrap();
        let again = core.authenticate(&second.access_token).await.unwrap();
        assert_eq!(again.user_id, principal.user_id);
    }

    #[tokio::test]
    async fn test_new_user_requires_city() {
        let result = core()
            .issue_token(
                None,
                IssueTokenRequest::User {
                    external_uid: "idp-43".to_string(),
                    city_code: None,
                    sos_id: None,
                },
            )
            .await;
        assert!(matches!(result, Err(IdentityError::Validation(_))));
    }

    #[tokio::test]
    async fn test_anon_citizen_cannot_claim_admin_scopes() {
        let result = core()
            .issue_token(
                None,
                IssueTokenRequest::AnonCitizen {
                    city_code: "QC".to_string(),
                    scopes: vec![Scope::ManageCities],
                    sos_id: None,
                },
            )
            .await;
        assert!(matches!(result, Err(IdentityError::Validation(_))));
    }

    #[tokio::test]
    async fn test_privileged_kinds_need_a_caller() {
        let core = core();
        let rescuer = IssueTokenRequest::AnonRescuer {
            sos_id: "sos-1".to_string(),
            scopes: None,
            city_code: None,
            ttl_secs: None,
        };
        assert!(matches!(
            core.issue_token(None, rescuer.clone()).await,
            Err(IdentityError::MissingCredentials)
        ));

        let citizen = Principal {
            user_id: Uuid::new_v4(),
            role: Role::Citizen,
            city_code: Some("QC".to_string()),
        };
        assert!(matches!(
            core.issue_token(Some(&citizen), rescuer).await,
            Err(IdentityError::Forbidden(_))
        ));

        let share = IssueTokenRequest::ShareLink {
            incident_id: "inc-1".to_string(),
            city_code: "MNL".to_string(),
            expires_in_secs: Some(3600),
            assignment_id: None,
            department_id: None,
            context_usage: None,
        };
        assert!(matches!(
            core.issue_token(Some(&citizen), share).await,
            Err(IdentityError::Forbidden(_))
        ));
    }

    fn rescuer_request(city_code: Option<&str>, ttl_secs: Option<i64>) -> IssueTokenRequest {
        IssueTokenRequest::AnonRescuer {
            sos_id: "sos-1".to_string(),
            scopes: None,
            city_code: city_code.map(str::to_string),
            ttl_secs,
        }
    }

    #[tokio::test]
    async fn test_anon_rescuer_limited_to_callers_city() {
        let core = core();
        let qc_admin = Principal {
            user_id: Uuid::new_v4(),
            role: Role::CityAdmin,
            city_code: Some("QC".to_string()),
        };

        assert!(core
            .issue_token(Some(&qc_admin), rescuer_request(None, None))
            .await
            .is_ok());
        assert!(core
            .issue_token(Some(&qc_admin), rescuer_request(Some("QC"), None))
            .await
            .is_ok());
        assert!(matches!(
            core.issue_token(Some(&qc_admin), rescuer_request(Some("MNL"), None))
                .await,
            Err(IdentityError::Forbidden(_))
        ));

        let app_admin = Principal {
            user_id: Uuid::new_v4(),
            role: Role::AppAdmin,
            city_code: None,
        };
        assert!(core
            .issue_token(Some(&app_admin), rescuer_request(Some("MNL"), None))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_anon_rescuer_lifetime_must_be_bounded() {
        let core = core();
        let admin = Principal {
            user_id: Uuid::new_v4(),
            role: Role::SosAdmin,
            city_code: Some("QC".to_string()),
        };

        let issued = core
            .issue_token(Some(&admin), rescuer_request(None, Some(600)))
            .await
            .unwrap();
        assert_eq!(issued.expires_in, 600);

        for ttl in [-60, 100 * 365 * 24 * 3600, i64::MAX] {
            assert!(matches!(
                core.issue_token(Some(&admin), rescuer_request(None, Some(ttl)))
                    .await,
                Err(IdentityError::Validation(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_authenticate_rejects_non_user_tokens() {
        let core = core();
        let anon = core
            .issue_token(
                None,
                IssueTokenRequest::AnonCitizen {
                    city_code: "QC".to_string(),
                    scopes: vec![],
                    sos_id: None,
                },
            )
            .await
            .unwrap();

        assert!(matches!(
            core.authenticate(&anon.access_token).await,
            Err(IdentityError::Forbidden(_))
        ));
        assert!(matches!(
            core.authenticate("").await,
            Err(IdentityError::MissingCredentials)
        ));
    }
}
