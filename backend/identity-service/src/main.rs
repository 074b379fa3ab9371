/// Identity Service Main Entry Point
///
/// Starts the internal HTTP API with:
/// - PostgreSQL connection pool (invites, missions, identity records, audit log)
/// - Redis connection manager (revocation ledger)
/// - RS256 access/refresh key pairs
use anyhow::{Context, Result};
use jwt_security::TokenUse;
use redis::aio::ConnectionManager;
use rescue_identity::{
    config::Settings,
    core::{CoreStores, IdentityCore},
    db::{PgAuditSink, PgIdentityStore, PgInviteStore, PgMissionStore},
    http::{start_http_server, HttpServerState},
    security::RedisRevocationStore,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rescue_identity=info,info")),
        )
        .with_target(false)
        .json()
        .init();

    info!("Starting Identity Service");

    let settings = Settings::load().context("Failed to load configuration")?;
    info!("Configuration loaded successfully");

    let codec = settings
        .jwt
        .build_codec()
        .context("Failed to initialize JWT keys")?;
    info!(
        access_kid = codec.key_id(TokenUse::Access),
        refresh_kid = codec.key_id(TokenUse::Refresh),
        "JWT keys initialized"
    );

    let db_pool = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .min_connections(settings.database.min_connections)
        .acquire_timeout(Duration::from_secs(settings.database.acquire_timeout))
        .connect(&settings.database.url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    info!(
        "Database pool initialized with {} max connections",
        settings.database.max_connections
    );

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .context("Failed to run database migrations")?;
    info!("Database migrations completed");

    let redis_client =
        redis::Client::open(settings.redis.url.as_str()).context("Invalid REDIS_URL")?;
    let redis = ConnectionManager::new(redis_client)
        .await
        .context("Failed to connect to Redis")?;
    info!("Redis connection manager initialized");

    let stores = CoreStores {
        revocations: Arc::new(RedisRevocationStore::new(
            redis,
            settings.redis.key_prefix.clone(),
        )),
        invites: Arc::new(PgInviteStore::new(db_pool.clone())),
        missions: Arc::new(PgMissionStore::new(db_pool.clone())),
        identities: Arc::new(PgIdentityStore::new(db_pool.clone())),
        audit: Arc::new(PgAuditSink::new(db_pool)),
    };

    info!(
        failure_policy = ?settings.core.revocation.failure_policy,
        check_enabled = settings.core.revocation.check_enabled,
        "Revocation ledger configured"
    );

    let core = Arc::new(IdentityCore::new(codec, settings.core.clone(), stores));

    start_http_server(
        HttpServerState {
            core,
            internal_api_key: settings.server.internal_api_key.clone(),
        },
        &settings.server.host,
        settings.server.port,
        shutdown_signal(),
    )
    .await
    .context("HTTP server error")?;

    info!("Identity service shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }

    info!("Shutting down gracefully...");
}
