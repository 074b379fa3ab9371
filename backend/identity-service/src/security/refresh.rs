//! Refresh-token rotation
//!
//! validate old (refresh key) -> issue new pair from the same claims -> revoke old.
//!
//! The final revoke is best effort: a ledger outage must not block rotation, but it is a
//! security-relevant event, so the outcome is returned to the caller, logged at warn level
//! and counted in `identity_refresh_revocation_skipped_total`. Two concurrent refreshes of the
//! same token may both succeed before either revocation lands; the old token's own expiry
//! bounds that window.

use super::issuer::TokenIssuer;
use super::token_revocation::RevocationLedger;
use super::validator::TokenValidator;
use crate::error::{IdentityError, Result};
use crate::metrics;
use crate::models::{MissionContext, RevocationOutcome, TokenResponse};
use jwt_security::TokenUse;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

const LEDGER_UNAVAILABLE: &str = "ledger_unavailable";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResult {
    pub tokens: TokenResponse,
    pub old_token_revocation: RevocationOutcome,
}

pub struct RefreshCoordinator {
    validator: Arc<TokenValidator>,
    issuer: Arc<TokenIssuer>,
    ledger: Arc<RevocationLedger>,
}

impl RefreshCoordinator {
    pub fn new(
        validator: Arc<TokenValidator>,
        issuer: Arc<TokenIssuer>,
        ledger: Arc<RevocationLedger>,
    ) -> Self {
        Self {
            validator,
            issuer,
            ledger,
        }
    }

    pub async fn refresh(
        &self,
        old_refresh_token: &str,
        sos_id_override: Option<String>,
    ) -> Result<RefreshResult> {
        let payload = self
            .validator
            .validate(old_refresh_token, TokenUse::Refresh)
            .await
            .into_result()
            .map_err(|reason| {
                info!(reason = reason.as_str(), "Refresh rejected");
                IdentityError::InvalidRefreshToken
            })?;

        let mut mission = payload.mission;
        if let Some(sos_id) = sos_id_override {
            mission.get_or_insert_with(MissionContext::default).sos_id = Some(sos_id);
        }

        let tokens = self
            .issuer
            .issue_pair_from_claims(payload.identity, payload.actor, mission)?;

        let old_token_revocation = match self.ledger.revoke(old_refresh_token).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    error = %e,
                    jti = %payload.jti,
                    "Failed to revoke rotated refresh token; it stays valid until expiry"
                );
                metrics::record_refresh_revocation_skipped(e.code());
                // Error detail stays in the log; callers see a stable reason
                RevocationOutcome::Skipped {
                    reason: LEDGER_UNAVAILABLE.to_string(),
                }
            }
        };

        Ok(RefreshResult {
            tokens,
            old_token_revocation,
        })
    }
}
