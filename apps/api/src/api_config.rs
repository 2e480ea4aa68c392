use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use nodeconductor_core::AppError;
use tracing_subscriber::EnvFilter;

/// Cookie and idle-expiry settings for the session layer.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub cookie_secure: bool,
    pub idle_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub database_url: String,
    pub frontend_url: String,
    pub api_host: String,
    pub api_port: u16,
    pub session: SessionSettings,
    pub worker_shared_secret: String,
    pub worker_max_claim_limit: usize,
    pub worker_default_lease_seconds: u32,
    pub default_security_groups: Option<String>,
    pub bootstrap_staff: Option<(String, String)>,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let database_url = required_env("DATABASE_URL")?;
        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned());

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3001);

        let cookie_secure = env::var("SESSION_COOKIE_SECURE")
            .unwrap_or_else(|_| "false".to_owned())
            .eq_ignore_ascii_case("true");
        let idle_minutes = parse_env("SESSION_IDLE_MINUTES", 30_i64)?;
        if idle_minutes <= 0 {
            return Err(AppError::Validation(
                "SESSION_IDLE_MINUTES must be greater than zero".to_owned(),
            ));
        }

        let worker_shared_secret = required_non_empty_env("WORKER_SHARED_SECRET")?;
        if worker_shared_secret.len() < 16 {
            return Err(AppError::Validation(
                "WORKER_SHARED_SECRET must be at least 16 characters".to_owned(),
            ));
        }

        let worker_max_claim_limit = parse_env("WORKER_MAX_CLAIM_LIMIT", 25_usize)?;
        if worker_max_claim_limit == 0 {
            return Err(AppError::Validation(
                "WORKER_MAX_CLAIM_LIMIT must be greater than zero".to_owned(),
            ));
        }
        let worker_default_lease_seconds = parse_env("WORKER_DEFAULT_LEASE_SECONDS", 120_u32)?;

        let default_security_groups = optional_env("DEFAULT_SECURITY_GROUPS");

        let bootstrap_staff = match (
            optional_env("BOOTSTRAP_STAFF_USERNAME"),
            optional_env("BOOTSTRAP_STAFF_PASSWORD"),
        ) {
            (Some(username), Some(password)) => Some((username, password)),
            (None, None) => None,
            _ => {
                return Err(AppError::Validation(
                    "BOOTSTRAP_STAFF_USERNAME and BOOTSTRAP_STAFF_PASSWORD must be set together"
                        .to_owned(),
                ));
            }
        };

        Ok(Self {
            migrate_only,
            database_url,
            frontend_url,
            api_host,
            api_port,
            session: SessionSettings {
                cookie_secure,
                idle_minutes,
            },
            worker_shared_secret,
            worker_max_claim_limit,
            worker_default_lease_seconds,
            default_security_groups,
            bootstrap_staff,
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

fn optional_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn parse_env<T>(name: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value.parse::<T>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
