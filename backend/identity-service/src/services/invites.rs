//! Invite-based admin provisioning
//!
//! PENDING --accept(correct code, before expiry)--> USED
//! PENDING --time passes expiresAt--> EXPIRED (derived at read time)
//!
//! Authority checks and input validation happen before any write. Create, validate and
//! accept each leave an audit record keyed by invite id, on success and on failure.

use super::audit::AuditTrail;
use super::authority::{ensure_can_provision, scope_invite_filter};
use crate::config::InviteSettings;
use crate::db::{IdentityStore, InviteStore};
use crate::error::{IdentityError, Result};
use crate::models::{
    AuditAction, AuditEntry, AuditOutcome, CreateInviteRequest, IdentityRecord, Invite,
    InviteFilter, InviteReceipt, InviteRejection, InviteState, InviteStatus, InviteSummary, Page, Principal,
    RoleGrantReceipt,
};
use crate::security::issuer::{TokenIssuer, UserTokenRequest};
use crate::validators::validate_invite_code;
use chrono::{Duration, Utc};
use rand::Rng;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    format!("{:06}", rng.gen_range(0..1_000_000))
}

pub struct InviteService {
    invites: Arc<dyn InviteStore>,
    identities: Arc<dyn IdentityStore>,
    issuer: Arc<TokenIssuer>,
    audit: AuditTrail,
    settings: InviteSettings,
}

impl InviteService {
    pub fn new(
        invites: Arc<dyn InviteStore>,
        identities: Arc<dyn IdentityStore>,
        issuer: Arc<TokenIssuer>,
        audit: AuditTrail,
        settings: InviteSettings,
    ) -> Self {
        Self {
            invites,
            identities,
            issuer,
            audit,
            settings,
        }
    }

    pub async fn create_invite(
        &self,
        creator: &Principal,
        req: CreateInviteRequest,
    ) -> Result<InviteReceipt> {
        let target_role = req.role;
        let municipality_code = req.municipality_code.clone();
        let result = self.try_create(creator, req).await;

        let entry = match &result {
            Ok(receipt) => AuditEntry::new(
                AuditAction::InviteCreated,
                AuditOutcome::Success,
                "invite",
                receipt.invite_id.to_string(),
            )
            .metadata(json!({
                "targetRole": receipt.role,
                "creatorRole": creator.role,
                "expiresAt": receipt.expires_at,
            })),
            Err(e) => AuditEntry::new(AuditAction::InviteCreated, AuditOutcome::Failure, "invite", "-")
                .metadata(json!({
                    "targetRole": target_role,
                    "creatorRole": creator.role,
                    "error": e.code(),
                })),
        };
        self.audit
            .emit(
                entry
                    .actor(creator.user_id)
                    .actor_role(creator.role)
                    .municipality(municipality_code),
            )
            .await;

        result
    }

    async fn try_create(
        &self,
        creator: &Principal,
        req: CreateInviteRequest,
    ) -> Result<InviteReceipt> {
        req.validate()?;
        ensure_can_provision(creator, req.role, &req.municipality_code)?;

        let now = Utc::now();
        let invite = Invite {
            id: Uuid::new_v4(),
            code: generate_code(),
            role: req.role,
            municipality_code: req.municipality_code,
            created_by_user_id: creator.user_id,
            created_at: now,
            expires_at: Invite::expiry_for(now),
            used_at: None,
            used_by_user_id: None,
            department: req.department,
            department_id: req.department_id,
        };

        self.invites.insert(&invite).await?;

        let registration = self.issuer.issue_admin_registration_token(&invite)?;
        let invite_link = format!(
            "{}/{}?token={}",
            self.settings.link_base_url, invite.id, registration.token
        );

        info!(
            invite_id = %invite.id,
            role = %invite.role,
            municipality_code = %invite.municipality_code,
            created_by = %creator.user_id,
            "Invite created"
        );

        Ok(InviteReceipt {
            invite_id: invite.id,
            code: invite.code,
            role: invite.role,
            municipality_code: invite.municipality_code,
            expires_at: invite.expires_at,
            invite_link,
        })
    }

    /// Never fails; anything unreadable is reported as INVALID
    pub async fn validate_invite(&self, invite_id: &str) -> InviteStatus {
        let status = self.read_status(invite_id).await;

        let outcome = if status.valid {
            AuditOutcome::Success
        } else {
            AuditOutcome::Failure
        };
        self.audit
            .emit(
                AuditEntry::new(AuditAction::InviteValidated, outcome, "invite", invite_id)
                    .metadata(json!({ "reason": status.reason })),
            )
            .await;

        status
    }

    async fn read_status(&self, invite_id: &str) -> InviteStatus {
        let Ok(id) = Uuid::parse_str(invite_id.trim()) else {
            return InviteStatus::rejected(InviteRejection::Invalid);
        };

        let invite = match self.invites.find(id).await {
            Ok(Some(invite)) => invite,
            Ok(None) => return InviteStatus::rejected(InviteRejection::Invalid),
            Err(e) => {
                warn!(error = %e, invite_id = %id, "Invite lookup failed during validation");
                return InviteStatus::rejected(InviteRejection::Invalid);
            }
        };

        match invite.state_at(Utc::now()) {
            InviteState::Pending => InviteStatus::valid(&invite),
            InviteState::Used => InviteStatus::rejected(InviteRejection::Used),
            InviteState::Expired => InviteStatus::rejected(InviteRejection::Expired),
        }
    }

    pub async fn accept_invite(
        &self,
        invite_id: Uuid,
        code: &str,
        user_id: Uuid,
    ) -> Result<RoleGrantReceipt> {
        let acceptor = self.identities.find_by_id(user_id).await;
        let actor_role = match &acceptor {
            Ok(Some(identity)) => Some(identity.role),
            _ => None,
        };
        let result = match acceptor {
            Ok(Some(identity)) => self.try_accept(invite_id, code, identity).await,
            Ok(None) => Err(IdentityError::UserNotFound),
            Err(e) => Err(e),
        };

        let mut entry = match &result {
            Ok(receipt) => {
                info!(
                    invite_id = %invite_id,
                    user_id = %user_id,
                    role = %receipt.role,
                    "Invite accepted"
                );
                AuditEntry::new(
                    AuditAction::InviteAccepted,
                    AuditOutcome::Success,
                    "invite",
                    invite_id.to_string(),
                )
                .municipality(receipt.municipality_code.clone())
                .metadata(json!({ "grantedRole": receipt.role }))
            }
            Err(e) => {
                info!(invite_id = %invite_id, user_id = %user_id, error = e.code(), "Invite acceptance rejected");
                AuditEntry::new(
                    AuditAction::InviteAcceptFailed,
                    AuditOutcome::Failure,
                    "invite",
                    invite_id.to_string(),
                )
                .metadata(json!({ "error": e.code() }))
            }
        };
        entry = entry.actor(user_id);
        if let Some(role) = actor_role {
            entry = entry.actor_role(role);
        }
        self.audit.emit(entry).await;

        result
    }

    async fn try_accept(
        &self,
        invite_id: Uuid,
        code: &str,
        identity: IdentityRecord,
    ) -> Result<RoleGrantReceipt> {
        if !validate_invite_code(code) {
            return Err(IdentityError::InvalidInviteCode);
        }

        if identity.role.is_platform_admin() {
            return Err(IdentityError::Forbidden(
                "platform admins cannot accept invites".to_string(),
            ));
        }

        let invite = self
            .invites
            .find(invite_id)
            .await?
            .ok_or(IdentityError::InviteNotFound)?;

        let now = Utc::now();
        match invite.state_at(now) {
            InviteState::Used => return Err(IdentityError::InviteAlreadyUsed),
            InviteState::Expired => return Err(IdentityError::InviteExpired),
            InviteState::Pending => {}
        }

        if invite.code != code {
            return Err(IdentityError::InvalidInviteCode);
        }

        if !self.invites.mark_used(invite.id, identity.id, now).await? {
            // Lost the race or lapsed in between; re-read to report which
            let current = self.invites.find(invite.id).await?;
            return Err(match current.map(|i| i.state_at(Utc::now())) {
                Some(InviteState::Expired) => IdentityError::InviteExpired,
                _ => IdentityError::InviteAlreadyUsed,
            });
        }

        let user_id = identity.id;
        let granted = self.grant(&invite, identity).await;
        if granted.is_err() {
            self.release_claim(invite.id, user_id).await;
        }
        granted
    }

    async fn grant(&self, invite: &Invite, identity: IdentityRecord) -> Result<RoleGrantReceipt> {
        if !self
            .identities
            .update_role(identity.id, invite.role, Some(&invite.municipality_code))
            .await?
        {
            return Err(IdentityError::UserNotFound);
        }

        let tokens = self.issuer.issue_user_token_pair(UserTokenRequest {
            user_id: identity.id,
            external_uid: Some(identity.external_uid),
            role: invite.role,
            city_code: Some(invite.municipality_code.clone()),
            scopes: None,
            mission_hint: None,
        })?;

        Ok(RoleGrantReceipt {
            invite_id: invite.id,
            user_id: identity.id,
            role: invite.role,
            municipality_code: invite.municipality_code.clone(),
            tokens,
        })
    }

    /// Returns a claimed invite to PENDING after the role grant failed
    async fn release_claim(&self, invite_id: Uuid, user_id: Uuid) {
        match self.invites.release(invite_id, user_id).await {
            Ok(true) => warn!(invite_id = %invite_id, user_id = %user_id, "Role grant failed; invite released"),
            Ok(false) => warn!(invite_id = %invite_id, user_id = %user_id, "Role grant failed; invite no longer held"),
            Err(e) => error!(
                error = %e,
                invite_id = %invite_id,
                user_id = %user_id,
                "Role grant failed and invite could not be released"
            ),
        }
    }

    pub async fn list_invites(
        &self,
        requester: &Principal,
        filter: InviteFilter,
    ) -> Result<Page<InviteSummary>> {
        filter.validate()?;
        let filter = scope_invite_filter(requester, filter)?;

        let now = Utc::now();
        let (invites, total) = self.invites.list(&filter, now).await?;

        Ok(Page {
            items: invites
                .into_iter()
                .map(|invite| InviteSummary::from_invite(invite, now))
                .collect(),
            page: filter.page(),
            limit: filter.limit(),
            total,
        })
    }

    /// Delete unused invites that expired more than the grace window ago
    pub async fn purge_stale_invites(&self) -> Result<u64> {
        let cutoff = Utc::now() - Duration::seconds(self.settings.purge_grace_secs);
        let purged = self.invites.purge_expired(cutoff).await?;

        if purged > 0 {
            info!(purged, cutoff = %cutoff, "Purged stale invites");
            self.audit
                .emit(
                    AuditEntry::new(AuditAction::InvitesPurged, AuditOutcome::Success, "invite", "*")
                        .metadata(json!({ "purged": purged, "cutoff": cutoff })),
                )
                .await;
        }

        Ok(purged)
    }
}
