/// Route handlers
///
/// Each handler decodes its input, resolves the caller where the route is privileged, and
/// delegates to one core operation. Errors render through `IdentityError`'s `IntoResponse`.
use super::HttpServerState;
use crate::core::IssueTokenRequest;
use crate::error::IdentityError;
use crate::models::{
    CreateInviteRequest, CreateMissionRequest, InviteFilter, InviteReceipt, InviteStatus,
    InviteSummary, MissionClaims, MissionToken, Page, Principal, RevocationOutcome,
    RoleGrantReceipt, TokenResponse, ValidationResult,
};
use crate::security::refresh::RefreshResult;
use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    Json,
};
use jwt_security::TokenUse;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

type ApiResult<T> = Result<Json<T>, IdentityError>;

/// Authenticated caller resolved from `Authorization: Bearer <user access token>`
#[derive(Debug, Clone)]
pub struct Caller(pub Principal);

#[async_trait]
impl FromRequestParts<Arc<HttpServerState>> for Caller {
    type Rejection = IdentityError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<HttpServerState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(IdentityError::MissingCredentials)?;

        state.core.authenticate(token).await.map(Caller)
    }
}

pub(super) async fn issue_token(
    State(state): State<Arc<HttpServerState>>,
    caller: Option<Caller>,
    Json(req): Json<IssueTokenRequest>,
) -> ApiResult<TokenResponse> {
    let caller = caller.map(|Caller(principal)| principal);
    state
        .core
        .issue_token(caller.as_ref(), req)
        .await
        .map(Json)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ValidateTokenBody {
    token: String,
    #[serde(default)]
    token_use: Option<String>,
}

/// Always 200; the body carries `valid` and the failure reason
pub(super) async fn validate_token(
    State(state): State<Arc<HttpServerState>>,
    Json(body): Json<ValidateTokenBody>,
) -> ApiResult<ValidationResult> {
    let expected_use = match body.token_use.as_deref() {
        None | Some("access") => TokenUse::Access,
        Some("refresh") => TokenUse::Refresh,
        Some(other) => {
            return Err(IdentityError::Validation(format!(
                "unknown tokenUse {}",
                other
            )))
        }
    };

    Ok(Json(
        state.core.validate_token(&body.token, expected_use).await,
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RefreshBody {
    refresh_token: String,
    sos_id: Option<String>,
}

pub(super) async fn refresh_token(
    State(state): State<Arc<HttpServerState>>,
    Json(body): Json<RefreshBody>,
) -> ApiResult<RefreshResult> {
    state
        .core
        .refresh_token(&body.refresh_token, body.sos_id)
        .await
        .map(Json)
}

#[derive(Debug, Deserialize)]
pub(super) struct TokenBody {
    token: String,
}

pub(super) async fn revoke_token(
    State(state): State<Arc<HttpServerState>>,
    Json(body): Json<TokenBody>,
) -> ApiResult<RevocationOutcome> {
    state.core.revoke_token(&body.token).await.map(Json)
}

pub(super) async fn create_invite(
    State(state): State<Arc<HttpServerState>>,
    Caller(caller): Caller,
    Json(req): Json<CreateInviteRequest>,
) -> Result<(StatusCode, Json<InviteReceipt>), IdentityError> {
    let receipt = state.core.create_invite(&caller, req).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub(super) async fn list_invites(
    State(state): State<Arc<HttpServerState>>,
    Caller(caller): Caller,
    Query(filter): Query<InviteFilter>,
) -> ApiResult<Page<InviteSummary>> {
    state.core.list_invites(&caller, filter).await.map(Json)
}

/// Unauthenticated; opened by the invite landing page
pub(super) async fn validate_invite(
    State(state): State<Arc<HttpServerState>>,
    Path(id): Path<String>,
) -> Json<InviteStatus> {
    Json(state.core.validate_invite(&id).await)
}

#[derive(Debug, Deserialize)]
pub(super) struct AcceptInviteBody {
    code: String,
}

pub(super) async fn accept_invite(
    State(state): State<Arc<HttpServerState>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
    Json(body): Json<AcceptInviteBody>,
) -> ApiResult<RoleGrantReceipt> {
    state
        .core
        .accept_invite(&caller, id, &body.code)
        .await
        .map(Json)
}

pub(super) async fn purge_invites(
    State(state): State<Arc<HttpServerState>>,
    Caller(caller): Caller,
) -> ApiResult<Value> {
    if !caller.role.is_platform_admin() {
        return Err(IdentityError::Forbidden(
            "only platform admins can purge invites".to_string(),
        ));
    }

    let purged = state.core.purge_stale_invites().await?;
    Ok(Json(json!({ "purged": purged })))
}

pub(super) async fn create_mission(
    State(state): State<Arc<HttpServerState>>,
    Caller(caller): Caller,
    Json(req): Json<CreateMissionRequest>,
) -> Result<(StatusCode, Json<MissionToken>), IdentityError> {
    let mission = state.core.create_mission(&caller, req).await?;
    Ok((StatusCode::CREATED, Json(mission)))
}

pub(super) async fn verify_mission(
    State(state): State<Arc<HttpServerState>>,
    Json(body): Json<TokenBody>,
) -> ApiResult<MissionClaims> {
    state.core.verify_mission(&body.token).await.map(Json)
}

pub(super) async fn revoke_mission(
    State(state): State<Arc<HttpServerState>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    let changed = state.core.revoke_mission(&caller, id).await?;
    Ok(Json(json!({ "missionId": id, "revoked": changed })))
}

pub(super) async fn revoke_sos_missions(
    State(state): State<Arc<HttpServerState>>,
    Caller(caller): Caller,
    Path(sos_id): Path<String>,
) -> ApiResult<Value> {
    let revoked = state.core.revoke_sos_missions(&caller, &sos_id).await?;
    Ok(Json(json!({ "sosId": sos_id, "revoked": revoked })))
}
