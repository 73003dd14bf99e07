//! Warden API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing::info;
use warden_application::{ExpiryScheduler, RestrictionPolicy, RestrictionService};
use warden_core::AppError;
use warden_infrastructure::{
    HttpMembershipGateway, PostgresAuditRepository, PostgresRestrictionRepository,
};

use crate::api_config::{ApiConfig, init_tracing};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    if config.migrate_only {
        info!("database migrations applied successfully");
        return Ok(());
    }

    let http_client = reqwest::Client::builder()
        .timeout(config.call_timeout)
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;
    let gateway = Arc::new(HttpMembershipGateway::new(
        http_client,
        config.platform_api_base_url.as_str(),
        config.platform_bot_token.as_str(),
    ));

    let restriction_service = RestrictionService::new(
        gateway,
        Arc::new(PostgresRestrictionRepository::new(pool.clone())),
        Arc::new(PostgresAuditRepository::new(pool.clone())),
        ExpiryScheduler::new(),
        RestrictionPolicy::new(config.sentinel_membership.clone())
            .with_call_timeout(config.call_timeout),
    );

    let recovery = restriction_service.recover_expiries().await?;
    info!(
        rearmed = recovery.rearmed,
        overdue = recovery.overdue,
        group_id = %config.group_id,
        "restriction expiries restored"
    );

    let app_state = AppState {
        restriction_service,
        postgres_pool: pool,
        group_id: config.group_id.clone(),
        gateway_secret: Arc::from(config.gateway_secret.as_str()),
    };
    let app = api_router::build_router(app_state);

    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, "warden-api listening");

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("api server error: {error}")))
}
