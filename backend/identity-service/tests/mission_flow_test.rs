// Rescuer mission lifecycle: create, verify, revoke single and per-SOS

mod common;

use common::Harness;
use jwt_security::TokenUse;
use rescue_identity::models::{AuditAction, CreateMissionRequest, Role, Scope, TokenType};
use rescue_identity::IdentityError;

fn mission(sos_id: &str, permissions: Option<Vec<Scope>>) -> CreateMissionRequest {
    CreateMissionRequest {
        sos_id: sos_id.to_string(),
        municipality_code: None,
        ttl_minutes: 60,
        permissions,
    }
}

#[tokio::test]
async fn mission_token_verifies_until_revoked() {
    let h = Harness::new();
    let sos_admin = h.seed("idp-sos", Role::SosAdmin, Some("QC")).await;

    let created = h
        .core
        .create_mission(
            &sos_admin,
            mission("sos-100", Some(vec![Scope::SendLocation, Scope::ViewSos])),
        )
        .await
        .unwrap();
    assert_eq!(created.municipality_code, "QC");
    assert_eq!(created.permissions, vec![Scope::ViewSos, Scope::SendLocation]);

    let payload = h
        .core
        .validate_token(&created.token, TokenUse::Access)
        .await
        .payload
        .unwrap();
    assert_eq!(payload.token_type, TokenType::RescuerMission);
    assert_eq!(payload.role(), Some(Role::Rescuer));

    let claims = h.core.verify_mission(&created.token).await.unwrap();
    assert_eq!(claims.mission_id, created.mission_id);
    assert_eq!(claims.sos_id, "sos-100");
    assert_eq!(claims.permissions, created.permissions);
    assert!(claims.rescuer_ref.is_some());

    assert!(h.core.revoke_mission(&sos_admin, created.mission_id).await.unwrap());
    assert!(!h.core.revoke_mission(&sos_admin, created.mission_id).await.unwrap());

    assert!(matches!(
        h.core.verify_mission(&created.token).await,
        Err(IdentityError::MissionRevoked)
    ));

    // The JWT itself is still well-formed; only the mission record is dead
    assert!(h.core.validate_token(&created.token, TokenUse::Access).await.valid);
}

#[tokio::test]
async fn revoking_an_sos_kills_every_mission_in_the_city() {
    let h = Harness::new();
    let qc_admin = h.seed("idp-qc", Role::CityAdmin, Some("QC")).await;
    let mnl_admin = h.seed("idp-mnl", Role::CityAdmin, Some("MNL")).await;

    let first = h.core.create_mission(&qc_admin, mission("sos-7", None)).await.unwrap();
    let second = h.core.create_mission(&qc_admin, mission("sos-7", None)).await.unwrap();
    let other_sos = h.core.create_mission(&qc_admin, mission("sos-8", None)).await.unwrap();
    let other_city = h.core.create_mission(&mnl_admin, mission("sos-7", None)).await.unwrap();

    assert_eq!(h.core.revoke_sos_missions(&qc_admin, "sos-7").await.unwrap(), 2);
    assert_eq!(h.core.revoke_sos_missions(&qc_admin, "sos-7").await.unwrap(), 0);

    for dead in [&first, &second] {
        assert!(matches!(
            h.core.verify_mission(&dead.token).await,
            Err(IdentityError::MissionRevoked)
        ));
    }
    assert!(h.core.verify_mission(&other_sos.token).await.is_ok());
    assert!(h.core.verify_mission(&other_city.token).await.is_ok());

    let audited = h
        .audit
        .entries()
        .await
        .into_iter()
        .filter(|e| e.action == AuditAction::SosMissionsRevoked)
        .count();
    assert_eq!(audited, 2);
}

#[tokio::test]
async fn only_local_admins_manage_missions() {
    let h = Harness::new();
    let rescuer = h.seed("idp-r", Role::Rescuer, Some("QC")).await;
    let qc_admin = h.seed("idp-qc", Role::CityAdmin, Some("QC")).await;
    let mnl_admin = h.seed("idp-mnl", Role::SosAdmin, Some("MNL")).await;

    assert!(matches!(
        h.core.create_mission(&rescuer, mission("sos-1", None)).await,
        Err(IdentityError::Forbidden(_))
    ));

    let mut foreign = mission("sos-1", None);
    foreign.municipality_code = Some("MNL".to_string());
    assert!(matches!(
        h.core.create_mission(&qc_admin, foreign).await,
        Err(IdentityError::Forbidden(_))
    ));

    let created = h.core.create_mission(&qc_admin, mission("sos-1", None)).await.unwrap();
    assert!(matches!(
        h.core.revoke_mission(&mnl_admin, created.mission_id).await,
        Err(IdentityError::Forbidden(_))
    ));
    assert!(h.core.verify_mission(&created.token).await.is_ok());
}

#[tokio::test]
async fn non_mission_tokens_are_rejected() {
    let h = Harness::new();
    let login = h
        .core
        .issue_token(
            None,
            rescue_identity::IssueTokenRequest::User {
                external_uid: "idp-u".to_string(),
                city_code: Some("QC".to_string()),
                sos_id: None,
            },
        )
        .await
        .unwrap();

    assert!(matches!(
        h.core.verify_mission(&login.access_token).await,
        Err(IdentityError::InvalidToken)
    ));
    assert!(h.core.verify_mission("not-a-jwt").await.is_err());
}
