//! Token validation
//!
//! Order matters: the revocation ledger is consulted first so that a revoked token fails
//! before any signature work is done. Every failure is reported as a [`ValidationResult`],
//! never as an error, so callers can tell a bad token apart from an outage.
//!
//! Ledger read errors follow [`RevocationFailurePolicy`]. With `FailOpen` (the default) a
//! degraded ledger does not deny every request platform-wide, at the cost of briefly honoring
//! revoked tokens; the event is logged at warn level and counted in
//! `identity_revocation_check_fail_open_total`. `FailClosed` rejects instead.

use super::token_revocation::RevocationLedger;
use crate::config::{RevocationFailurePolicy, RevocationSettings};
use crate::metrics;
use crate::models::{TokenPayload, ValidationFailure, ValidationResult};
use jwt_security::{JwtCodec, JwtError, TokenUse};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct TokenValidator {
    codec: Arc<JwtCodec>,
    ledger: Arc<RevocationLedger>,
    check_revocation: bool,
    failure_policy: RevocationFailurePolicy,
}

impl TokenValidator {
    pub fn new(
        codec: Arc<JwtCodec>,
        ledger: Arc<RevocationLedger>,
        settings: &RevocationSettings,
    ) -> Self {
        Self {
            codec,
            ledger,
            check_revocation: settings.check_enabled,
            failure_policy: settings.failure_policy,
        }
    }

    pub async fn validate(&self, token: &str, expected_use: TokenUse) -> ValidationResult {
        let token = token.trim();
        if token.is_empty() {
            return reject(ValidationFailure::Malformed);
        }

        if self.check_revocation {
            match self.ledger.is_revoked(token).await {
                Ok(true) => return reject(ValidationFailure::Revoked),
                Ok(false) => {}
                Err(e) => match self.failure_policy {
                    RevocationFailurePolicy::FailOpen => {
                        warn!(
                            error = %e,
                            token_use = expected_use.as_str(),
                            "Revocation ledger unavailable, treating token as not revoked"
                        );
                        metrics::record_revocation_fail_open(expected_use.as_str());
                    }
                    RevocationFailurePolicy::FailClosed => {
                        warn!(
                            error = %e,
                            token_use = expected_use.as_str(),
                            "Revocation ledger unavailable, rejecting token"
                        );
                        return reject(ValidationFailure::RevocationUnavailable);
                    }
                },
            }
        }

        let payload: TokenPayload = match self.codec.verify(expected_use, token) {
            Ok(payload) => payload,
            Err(e) => return reject(failure_from_jwt(&e)),
        };

        if payload.token_type.token_use() != expected_use {
            return reject(ValidationFailure::WrongTokenType);
        }

        ValidationResult::ok(payload)
    }
}

fn failure_from_jwt(err: &JwtError) -> ValidationFailure {
    match err {
        JwtError::Expired => ValidationFailure::Expired,
        JwtError::InvalidSignature => ValidationFailure::InvalidSignature,
        JwtError::InvalidIssuer => ValidationFailure::InvalidIssuer,
        JwtError::InvalidAudience => ValidationFailure::InvalidAudience,
        _ => ValidationFailure::Malformed,
    }
}

fn reject(reason: ValidationFailure) -> ValidationResult {
    debug!(reason = reason.as_str(), "Token validation failed");
    metrics::record_validation_failure(reason.as_str());
    ValidationResult::failed(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenTtlSettings;
    use crate::db::memory::InMemoryRevocationStore;
    use crate::error::IdentityError;
    use crate::models::{Role, TokenType};
    use crate::security::issuer::{TokenIssuer, UserTokenRequest};
    use crate::security::token_revocation::MockRevocationStore;
    use chrono::{Duration, Utc};
    use jwt_security::test_utils::test_codec;
    use serde_json::json;
    use uuid::Uuid;

    fn settings(policy: RevocationFailurePolicy) -> RevocationSettings {
        RevocationSettings {
            failure_policy: policy,
            ..Default::default()
        }
    }

    fn validator_with(
        store: Arc<dyn crate::security::token_revocation::RevocationStore>,
        policy: RevocationFailurePolicy,
    ) -> (TokenValidator, Arc<RevocationLedger>) {
        let ledger = Arc::new(RevocationLedger::new(store, Duration::days(7)));
        let validator =
            TokenValidator::new(Arc::new(test_codec()), ledger.clone(), &settings(policy));
        (validator, ledger)
    }

    fn issue_pair() -> (String, String) {
        let issuer = TokenIssuer::new(Arc::new(test_codec()), TokenTtlSettings::default());
        let pair = issuer
            .issue_user_token_pair(UserTokenRequest {
                user_id: Uuid::new_v4(),
                external_uid: None,
                role: Role::Citizen,
                city_code: Some("QC".to_string()),
                scopes: None,
                mission_hint: None,
            })
            .unwrap();
        (pair.access_token, pair.refresh_token.unwrap())
    }

    fn failing_store() -> Arc<MockRevocationStore> {
        let mut store = MockRevocationStore::new();
        store
            .expect_contains()
            .returning(|_| Err(IdentityError::Redis("timeout".to_string())));
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_valid_access_token() {
        let (validator, _) = validator_with(
            Arc::new(InMemoryRevocationStore::new()),
            RevocationFailurePolicy::FailOpen,
        );
        let (access, _) = issue_pair();

        let result = validator.validate(&access, TokenUse::Access).await;
        assert!(result.valid);
        assert_eq!(result.payload.unwrap().token_type, TokenType::Access);
    }

    #[tokio::test]
    async fn test_revoked_token_fails_before_crypto() {
        let (validator, ledger) = validator_with(
            Arc::new(InMemoryRevocationStore::new()),
            RevocationFailurePolicy::FailOpen,
        );
        let (access, _) = issue_pair();

        ledger.revoke(&access).await.unwrap();

        let result = validator.validate(&access, TokenUse::Access).await;
        assert!(!result.valid);
        assert_eq!(result.error, Some(ValidationFailure::Revoked));
    }

    #[tokio::test]
    async fn test_refresh_token_rejected_as_access() {
        let (validator, _) = validator_with(
            Arc::new(InMemoryRevocationStore::new()),
            RevocationFailurePolicy::FailOpen,
        );
        let (access, refresh) = issue_pair();

        let result = validator.validate(&refresh, TokenUse::Access).await;
        assert_eq!(result.error, Some(ValidationFailure::InvalidSignature));

        let result = validator.validate(&access, TokenUse::Refresh).await;
        assert_eq!(result.error, Some(ValidationFailure::InvalidSignature));
    }

    #[tokio::test]
    async fn test_token_type_must_match_use() {
        let (validator, _) = validator_with(
            Arc::new(InMemoryRevocationStore::new()),
            RevocationFailurePolicy::FailOpen,
        );
        let now = Utc::now().timestamp();
        // Signed with the refresh key but tagged as an access token
        let forged = test_codec()
            .sign(
                TokenUse::Refresh,
                &json!({
                    "iss": jwt_security::test_utils::TEST_ISSUER,
                    "aud": jwt_security::test_utils::TEST_AUDIENCE,
                    "iat": now,
                    "exp": now + 600,
                    "jti": Uuid::new_v4(),
                    "actor": { "type": "ANON", "cityCode": "QC" },
                    "tokenType": "access",
                }),
            )
            .unwrap();

        let result = validator.validate(&forged, TokenUse::Refresh).await;
        assert_eq!(result.error, Some(ValidationFailure::WrongTokenType));
    }

    #[tokio::test]
    async fn test_garbage_is_malformed() {
        let (validator, _) = validator_with(
            Arc::new(InMemoryRevocationStore::new()),
            RevocationFailurePolicy::FailOpen,
        );

        for token in ["", "   ", "abc.def.ghi"] {
            let result = validator.validate(token, TokenUse::Access).await;
            assert!(!result.valid, "{:?} should not validate", token);
        }
    }

    #[tokio::test]
    async fn test_fail_open_policy_accepts_on_ledger_error() {
        let (validator, _) = validator_with(failing_store(), RevocationFailurePolicy::FailOpen);
        let (access, _) = issue_pair();

        let before = metrics::revocation_fail_open_count("access");
        let result = validator.validate(&access, TokenUse::Access).await;

        assert!(result.valid);
        assert!(metrics::revocation_fail_open_count("access") > before);
    }

    #[tokio::test]
    async fn test_fail_closed_policy_rejects_on_ledger_error() {
        let (validator, _) = validator_with(failing_store(), RevocationFailurePolicy::FailClosed);
        let (access, _) = issue_pair();

        let result = validator.validate(&access, TokenUse::Access).await;
        assert!(!result.valid);
        assert_eq!(result.error, Some(ValidationFailure::RevocationUnavailable));
    }

    #[tokio::test]
    async fn test_revocation_check_can_be_disabled() {
        let ledger = Arc::new(RevocationLedger::new(
            Arc::new(InMemoryRevocationStore::new()),
            Duration::days(7),
        ));
        let validator = TokenValidator::new(
            Arc::new(test_codec()),
            ledger.clone(),
            &RevocationSettings {
                check_enabled: false,
                ..Default::default()
            },
        );
        let (access, _) = issue_pair();
        ledger.revoke(&access).await.unwrap();

        assert!(validator.validate(&access, TokenUse::Access).await.valid);
    }
}
