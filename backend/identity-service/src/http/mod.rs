/// Internal HTTP API
///
/// Thin JSON routes over [`IdentityCore`]; no business logic lives in handlers.
///
/// Security: every route except `/health` and `/metrics` requires the
/// `X-Internal-API-Key` header. Privileged routes additionally take the caller's
/// user access token as `Authorization: Bearer ...`.
mod handlers;

pub use handlers::Caller;

use crate::core::IdentityCore;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared HTTP server state
#[derive(Clone)]
pub struct HttpServerState {
    pub core: Arc<IdentityCore>,
    pub internal_api_key: Option<String>,
}

pub fn build_router(state: HttpServerState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/v1/tokens", post(handlers::issue_token))
        .route("/v1/tokens/validate", post(handlers::validate_token))
        .route("/v1/tokens/refresh", post(handlers::refresh_token))
        .route("/v1/tokens/revoke", post(handlers::revoke_token))
        .route(
            "/v1/invites",
            post(handlers::create_invite).get(handlers::list_invites),
        )
        .route("/v1/invites/:id", get(handlers::validate_invite))
        .route("/v1/invites/:id/accept", post(handlers::accept_invite))
        .route("/v1/admin/invites/purge", post(handlers::purge_invites))
        .route("/v1/missions", post(handlers::create_mission))
        .route("/v1/missions/verify", post(handlers::verify_mission))
        .route("/v1/missions/:id", delete(handlers::revoke_mission))
        .route("/v1/sos/:sos_id/missions", delete(handlers::revoke_sos_missions))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint (no auth required)
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn metrics_handler() -> impl IntoResponse {
    (StatusCode::OK, crate::metrics::render())
}

/// Validates the X-Internal-API-Key header
async fn auth_middleware(
    State(state): State<Arc<HttpServerState>>,
    request: Request,
    next: Next,
) -> Response {
    if matches!(request.uri().path(), "/health" | "/metrics") {
        return next.run(request).await;
    }

    let Some(expected_key) = &state.internal_api_key else {
        warn!("Internal API key not configured - blocking all internal requests");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal API key not configured",
        )
            .into_response();
    };

    let provided_key = request
        .headers()
        .get("x-internal-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if provided_key != expected_key {
        warn!(
            path = %request.uri().path(),
            "Unauthorized internal API request - invalid API key"
        );
        return (StatusCode::UNAUTHORIZED, "Invalid API key").into_response();
    }

    next.run(request).await
}

pub async fn start_http_server(
    state: HttpServerState,
    host: &str,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = build_router(state);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Starting identity HTTP API on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreSettings;
    use crate::core::CoreStores;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use jwt_security::test_utils::test_codec;
    use tower::ServiceExt;

    fn router(key: Option<&str>) -> Router {
        build_router(HttpServerState {
            core: Arc::new(IdentityCore::new(
                test_codec(),
                CoreSettings::default(),
                CoreStores::in_memory(),
            )),
            internal_api_key: key.map(str::to_string),
        })
    }

    fn anon_citizen_request(key: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::post("/v1/tokens").header("content-type", "application/json");
        if let Some(key) = key {
            builder = builder.header("x-internal-api-key", key);
        }
        builder
            .body(Body::from(r#"{"kind":"ANON_CITIZEN","cityCode":"QC"}"#))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_skips_api_key() {
        let response = router(Some("secret"))
            .oneshot(HttpRequest::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_key_enforced() {
        let response = router(Some("secret"))
            .oneshot(anon_citizen_request(Some("wrong")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = router(None)
            .oneshot(anon_citizen_request(Some("secret")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = router(Some("secret"))
            .oneshot(anon_citizen_request(Some("secret")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_privileged_route_requires_bearer() {
        let response = router(Some("secret"))
            .oneshot(
                HttpRequest::post("/v1/invites")
                    .header("x-internal-api-key", "secret")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"role":"RESCUER","municipalityCode":"QC"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
