use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use tracing_subscriber::EnvFilter;
use warden_application::RestrictionPolicy;
use warden_core::{AppError, GroupId};
use warden_domain::MembershipId;

const MIN_GATEWAY_SECRET_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub database_url: String,
    pub group_id: GroupId,
    pub sentinel_membership: MembershipId,
    pub gateway_secret: String,
    pub platform_api_base_url: String,
    pub platform_bot_token: String,
    pub call_timeout: Duration,
    pub api_host: String,
    pub api_port: u16,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let database_url = required_env("DATABASE_URL")?;
        let group_id = GroupId::new(required_non_empty_env("WARDEN_GROUP_ID")?)?;
        let sentinel_membership =
            MembershipId::new(required_non_empty_env("WARDEN_SENTINEL_MEMBERSHIP_ID")?)?;
        let gateway_secret = gateway_secret(required_env("WARDEN_GATEWAY_SECRET")?)?;
        let platform_api_base_url = env::var("WARDEN_PLATFORM_API_BASE_URL")
            .unwrap_or_else(|_| "https://discord.com/api/v10".to_owned())
            .trim_end_matches('/')
            .to_owned();
        let platform_bot_token = required_non_empty_env("WARDEN_PLATFORM_BOT_TOKEN")?;
        let call_timeout = call_timeout(env::var("WARDEN_CALL_TIMEOUT_MS").ok())?;

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3001);

        Ok(Self {
            migrate_only,
            database_url,
            group_id,
            sentinel_membership,
            gateway_secret,
            platform_api_base_url,
            platform_bot_token,
            call_timeout,
            api_host,
            api_port,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn gateway_secret(value: String) -> Result<String, AppError> {
    if value.len() < MIN_GATEWAY_SECRET_LEN {
        return Err(AppError::Validation(format!(
            "WARDEN_GATEWAY_SECRET must be at least {MIN_GATEWAY_SECRET_LEN} characters"
        )));
    }

    Ok(value)
}

fn call_timeout(value: Option<String>) -> Result<Duration, AppError> {
    let Some(value) = value else {
        return Ok(RestrictionPolicy::DEFAULT_CALL_TIMEOUT);
    };

    let millis = value.trim().parse::<u64>().map_err(|error| {
        AppError::Validation(format!("invalid WARDEN_CALL_TIMEOUT_MS value '{value}': {error}"))
    })?;
    if millis == 0 {
        return Err(AppError::Validation(
            "WARDEN_CALL_TIMEOUT_MS must be greater than zero".to_owned(),
        ));
    }

    Ok(Duration::from_millis(millis))
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}
