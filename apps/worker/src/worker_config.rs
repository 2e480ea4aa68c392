use std::env;
use std::str::FromStr;
use std::time::Duration;

use nodeconductor_core::{AppError, AppResult};

/// Runtime settings for one worker process, read from the environment.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub api_base_url: String,
    pub shared_secret: String,
    pub worker_id: String,
    pub claim_limit: usize,
    pub lease_seconds: u32,
    pub poll_interval: Duration,
    pub backend: BackendSettings,
}

/// Selects the cloud backend the worker drives.
#[derive(Debug, Clone)]
pub enum BackendSettings {
    Http {
        base_url: String,
        max_attempts: u8,
        retry_backoff_ms: u64,
    },
    Simulated {
        latency: Duration,
    },
}

impl WorkerConfig {
    pub fn load() -> AppResult<Self> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| AppError::Validation("DATABASE_URL is required".to_owned()))?;
        let api_base_url = optional_env("WORKER_API_BASE_URL")
            .unwrap_or_else(|| "http://127.0.0.1:3001".to_owned())
            .trim_end_matches('/')
            .to_owned();
        let shared_secret = optional_env("WORKER_SHARED_SECRET").ok_or_else(|| {
            AppError::Validation("WORKER_SHARED_SECRET is required".to_owned())
        })?;
        let worker_id = optional_env("WORKER_ID")
            .unwrap_or_else(|| format!("worker-{}", std::process::id()));

        let claim_limit = positive_env("WORKER_CLAIM_LIMIT", 10_usize)?;
        let lease_seconds = positive_env("WORKER_LEASE_SECONDS", 120_u32)?;
        let poll_interval_ms = positive_env("WORKER_POLL_INTERVAL_MS", 1500_u64)?;

        let backend = match optional_env("CLOUD_BACKEND_URL") {
            Some(base_url) => BackendSettings::Http {
                base_url,
                max_attempts: positive_env("CLOUD_BACKEND_MAX_ATTEMPTS", 3_u8)?,
                retry_backoff_ms: parse_env("CLOUD_BACKEND_RETRY_BACKOFF_MS", 250_u64)?,
            },
            None => BackendSettings::Simulated {
                latency: Duration::from_millis(parse_env("SIMULATED_BACKEND_LATENCY_MS", 200_u64)?),
            },
        };

        Ok(Self {
            database_url,
            api_base_url,
            shared_secret,
            worker_id,
            claim_limit,
            lease_seconds,
            poll_interval: Duration::from_millis(poll_interval_ms),
            backend,
        })
    }
}

fn optional_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_env<T>(name: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(name) {
        Some(value) => value.parse::<T>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}

fn positive_env<T>(name: &str, default: T) -> AppResult<T>
where
    T: FromStr + Default + PartialEq,
    T::Err: std::fmt::Display,
{
    let value = parse_env(name, default)?;
    if value == T::default() {
        return Err(AppError::Validation(format!(
            "{name} must be greater than zero"
        )));
    }

    Ok(value)
}
