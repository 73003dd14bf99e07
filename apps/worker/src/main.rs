//! Warden retention worker runtime.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use warden_application::{RestrictionPolicy, RetentionJanitor};
use warden_core::{AppError, AppResult};
use warden_domain::{DEFAULT_RETENTION_DAYS, RetentionHorizon};
use warden_infrastructure::PostgresRestrictionRepository;

#[derive(Debug, Clone)]
struct WorkerConfig {
    database_url: String,
    retention: RetentionHorizon,
    sweep_interval_seconds: u64,
    call_timeout: Duration,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;
    let repository = Arc::new(PostgresRestrictionRepository::new(pool));
    let janitor = RetentionJanitor::new(repository, config.retention)
        .with_call_timeout(config.call_timeout);

    info!(
        retention_days = config.retention.days(),
        sweep_interval_seconds = config.sweep_interval_seconds,
        call_timeout_ms = config.call_timeout.as_millis(),
        "warden-worker started"
    );

    janitor
        .run_periodically(Duration::from_secs(config.sweep_interval_seconds))
        .await;

    Ok(())
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let retention_days =
            parse_env_i64("RESTRICTION_RETENTION_DAYS", i64::from(DEFAULT_RETENTION_DAYS))?;
        let sweep_interval_seconds = parse_env_u64("RETENTION_SWEEP_INTERVAL_SECONDS", 86_400)?;
        let default_timeout_ms =
            u64::try_from(RestrictionPolicy::DEFAULT_CALL_TIMEOUT.as_millis()).unwrap_or(u64::MAX);
        let call_timeout_ms = parse_env_u64("WARDEN_CALL_TIMEOUT_MS", default_timeout_ms)?;

        if sweep_interval_seconds == 0 {
            return Err(AppError::Validation(
                "RETENTION_SWEEP_INTERVAL_SECONDS must be greater than zero".to_owned(),
            ));
        }

        if call_timeout_ms == 0 {
            return Err(AppError::Validation(
                "WARDEN_CALL_TIMEOUT_MS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            retention: retention_horizon(retention_days),
            sweep_interval_seconds,
            call_timeout: Duration::from_millis(call_timeout_ms),
        })
    }
}

fn retention_horizon(days: i64) -> RetentionHorizon {
    if days < 1 {
        warn!(
            requested_days = days,
            "RESTRICTION_RETENTION_DAYS below one day, using one day"
        );
    }
    RetentionHorizon::from_days(days)
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn parse_env_i64(name: &str, default: i64) -> AppResult<i64> {
    match env::var(name) {
        Ok(value) => value.trim().parse::<i64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.trim().parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
