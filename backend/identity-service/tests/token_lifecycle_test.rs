// Token issuance, validation, revocation and refresh rotation through IdentityCore

mod common;

use chrono::{Duration, Utc};
use common::Harness;
use jwt_security::test_utils::test_codec;
use jwt_security::TokenUse;
use rescue_identity::config::{RevocationSettings, TokenTtlSettings};
use rescue_identity::db::memory::InMemoryRevocationStore;
use rescue_identity::models::{
    ActorType, Invite, RevocationOutcome, Role, Scope, TokenType, ValidationFailure,
};
use rescue_identity::security::issuer::{
    ShareLinkRequest, SignedToken, TokenIssuer, UserTokenRequest,
};
use rescue_identity::security::token_revocation::RevocationLedger;
use rescue_identity::security::validator::TokenValidator;
use rescue_identity::{IdentityError, IssueTokenRequest};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

fn login(external_uid: &str) -> IssueTokenRequest {
    IssueTokenRequest::User {
        external_uid: external_uid.to_string(),
        city_code: Some("QC".to_string()),
        sos_id: None,
    }
}

#[tokio::test]
async fn anon_citizen_token_has_no_identity_and_no_refresh() {
    let h = Harness::new();
    let response = h
        .core
        .issue_token(
            None,
            serde_json::from_value(json!({ "kind": "ANON_CITIZEN", "cityCode": "QC" })).unwrap(),
        )
        .await
        .unwrap();

    assert!(response.refresh_token.is_none());

    let result = h
        .core
        .validate_token(&response.access_token, TokenUse::Access)
        .await;
    assert!(result.valid);

    let payload = result.payload.unwrap();
    assert_eq!(payload.actor.actor_type, ActorType::Anon);
    assert_eq!(payload.actor.city_code.as_deref(), Some("QC"));
    assert_eq!(payload.token_type, TokenType::AnonCitizen);
    assert!(payload.identity.is_none());

    let wire = serde_json::to_value(&payload).unwrap();
    assert_eq!(wire["actor"]["type"], "ANON");
    assert!(wire.get("identity").is_none());
}

#[tokio::test]
async fn user_pair_validates_against_its_own_key_only() {
    let h = Harness::new();
    let pair = h.core.issue_token(None, login("idp-pair")).await.unwrap();
    let refresh = pair.refresh_token.expect("user logins carry a refresh token");

    assert!(h.core.validate_token(&pair.access_token, TokenUse::Access).await.valid);
    assert!(h.core.validate_token(&refresh, TokenUse::Refresh).await.valid);

    let crossed = h.core.validate_token(&refresh, TokenUse::Access).await;
    assert!(!crossed.valid);
    assert_eq!(crossed.error, Some(ValidationFailure::InvalidSignature));

    let crossed = h.core.validate_token(&pair.access_token, TokenUse::Refresh).await;
    assert!(!crossed.valid);
}

#[tokio::test]
async fn revocation_is_terminal_and_idempotent() {
    let h = Harness::new();
    let pair = h.core.issue_token(None, login("idp-revoke")).await.unwrap();

    assert_eq!(
        h.core.revoke_token(&pair.access_token).await.unwrap(),
        RevocationOutcome::Revoked
    );
    assert_eq!(
        h.core.revoke_token(&pair.access_token).await.unwrap(),
        RevocationOutcome::AlreadyRevoked
    );

    for _ in 0..3 {
        let result = h.core.validate_token(&pair.access_token, TokenUse::Access).await;
        assert!(!result.valid);
        assert_eq!(result.error, Some(ValidationFailure::Revoked));
    }

    assert!(matches!(
        h.core.authenticate(&pair.access_token).await,
        Err(IdentityError::TokenRevoked)
    ));
}

#[tokio::test]
async fn refresh_rotates_and_blocks_replay() {
    let h = Harness::new();
    let pair = h.core.issue_token(None, login("idp-rotate")).await.unwrap();
    let old_refresh = pair.refresh_token.unwrap();

    let rotated = h
        .core
        .refresh_token(&old_refresh, Some("sos-77".to_string()))
        .await
        .unwrap();
    assert_eq!(rotated.old_token_revocation, RevocationOutcome::Revoked);

    let new_refresh = rotated.tokens.refresh_token.clone().unwrap();
    assert_ne!(new_refresh, old_refresh);

    let access = h
        .core
        .validate_token(&rotated.tokens.access_token, TokenUse::Access)
        .await
        .payload
        .unwrap();
    assert_eq!(access.role(), Some(Role::Citizen));
    assert_eq!(
        access.mission.and_then(|m| m.sos_id).as_deref(),
        Some("sos-77")
    );

    assert!(matches!(
        h.core.refresh_token(&old_refresh, None).await,
        Err(IdentityError::InvalidRefreshToken)
    ));
    assert!(h.core.refresh_token(&new_refresh, None).await.is_ok());
}

#[tokio::test]
async fn share_link_is_bounded_to_the_callers_city() {
    let h = Harness::new();
    let city_admin = h.seed("idp-qc-admin", Role::CityAdmin, Some("QC")).await;

    let share = |city: &str| IssueTokenRequest::ShareLink {
        incident_id: "inc-9".to_string(),
        city_code: city.to_string(),
        expires_in_secs: Some(3600),
        assignment_id: Some("asg-1".to_string()),
        department_id: None,
        context_usage: None,
    };

    let link = h
        .core
        .issue_token(Some(&city_admin), share("QC"))
        .await
        .unwrap();
    let payload = h
        .core
        .validate_token(&link.access_token, TokenUse::Access)
        .await
        .payload
        .unwrap();
    assert_eq!(payload.actor.actor_type, ActorType::ShareLink);
    assert_eq!(payload.token_type, TokenType::ShareLink);
    assert!(!payload.effective_scopes().is_empty());

    assert!(matches!(
        h.core.issue_token(Some(&city_admin), share("MNL")).await,
        Err(IdentityError::Forbidden(_))
    ));
}

#[tokio::test]
async fn every_token_kind_validates_to_the_payload_it_was_signed_with() {
    let codec = Arc::new(test_codec());
    let issuer = TokenIssuer::new(codec.clone(), TokenTtlSettings::default());
    let ledger = Arc::new(RevocationLedger::new(
        Arc::new(InMemoryRevocationStore::new()),
        Duration::days(7),
    ));
    let validator = TokenValidator::new(codec, ledger, &RevocationSettings::default());

    let user = issuer
        .sign_user_pair(UserTokenRequest {
            user_id: Uuid::new_v4(),
            external_uid: Some("idp-roundtrip".to_string()),
            role: Role::SosAdmin,
            city_code: Some("QC".to_string()),
            scopes: None,
            mission_hint: None,
        })
        .unwrap();

    let anon_citizen = issuer
        .sign_anon_citizen("QC", vec![Scope::ViewSos], Some("sos-11".to_string()))
        .unwrap();

    let rescuer = issuer
        .issue_anon_rescuer_mission_token(
            "sos-11",
            Some(Uuid::new_v4()),
            vec![Scope::ViewSos, Scope::SendLocation],
            Some("QC".to_string()),
            Some(1800),
        )
        .unwrap();

    let share_link = issuer
        .issue_share_link_token(ShareLinkRequest {
            incident_id: "inc-11".to_string(),
            city_code: "QC".to_string(),
            expires_in_secs: Some(600),
            assignment_id: Some("asg-11".to_string()),
            department_id: Some("dept-2".to_string()),
            context_usage: None,
        })
        .unwrap();

    let now = Utc::now();
    let invite = Invite {
        id: Uuid::new_v4(),
        code: "482913".to_string(),
        role: Role::Rescuer,
        municipality_code: "QC".to_string(),
        created_by_user_id: Uuid::new_v4(),
        created_at: now,
        expires_at: Invite::expiry_for(now),
        used_at: None,
        used_by_user_id: None,
        department: None,
        department_id: None,
    };
    let registration = issuer.issue_admin_registration_token(&invite).unwrap();

    let cases: [(&str, &SignedToken, TokenUse); 6] = [
        ("user access", &user.access, TokenUse::Access),
        ("user refresh", &user.refresh, TokenUse::Refresh),
        ("anon citizen", &anon_citizen, TokenUse::Access),
        ("rescuer mission", &rescuer, TokenUse::Access),
        ("share link", &share_link, TokenUse::Access),
        ("admin registration", &registration, TokenUse::Access),
    ];

    for (kind, signed, token_use) in cases {
        let result = validator.validate(&signed.token, token_use).await;
        assert!(result.valid, "{kind} should validate: {:?}", result.error);
        assert_eq!(result.payload.as_ref(), Some(&signed.payload), "{kind} payload drifted");
    }
}
