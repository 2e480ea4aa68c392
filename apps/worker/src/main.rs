//! NodeConductor backend task worker.
//!
//! Polls the API for leased tasks, drives them against the configured cloud
//! backend and reports per-cycle counters through the heartbeat endpoint.

#![forbid(unsafe_code)]

mod worker_api;
mod worker_config;

use std::sync::Arc;
use std::time::Duration;

use nodeconductor_application::{CloudBackend, StateTransitionExecutor, TaskProcessor};
use nodeconductor_core::{AppError, AppResult};
use nodeconductor_infrastructure::{
    HttpCloudBackend, PostgresAuditRepository, PostgresCloudRepository,
    PostgresInstanceRepository, PostgresStateRepository, PostgresTaskQueueRepository,
    SimulatedCloudBackend,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::worker_api::{CycleStats, WorkerApiClient};
use crate::worker_config::{BackendSettings, WorkerConfig};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(config.database_url.as_str())
        .await
        .map_err(|error| AppError::Internal(format!("database connection failed: {error}")))?;
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;

    let processor = build_task_processor(pool, http_client.clone(), &config.backend);
    let api = WorkerApiClient::new(http_client, &config);

    info!(
        worker_id = %config.worker_id,
        api_base_url = %config.api_base_url,
        claim_limit = config.claim_limit,
        lease_seconds = config.lease_seconds,
        simulated_backend = matches!(config.backend, BackendSettings::Simulated { .. }),
        "nodeconductor-worker started"
    );

    loop {
        match run_cycle(&api, &processor, config.worker_id.as_str()).await {
            Ok(stats) => {
                if let Err(error) = api.send_heartbeat(stats).await {
                    warn!(worker_id = %config.worker_id, error = %error, "heartbeat rejected");
                }
                if stats.claimed_tasks == 0 {
                    tokio::time::sleep(config.poll_interval).await;
                }
            }
            Err(error) => {
                warn!(worker_id = %config.worker_id, error = %error, "task claim failed");
                tokio::time::sleep(config.poll_interval).await;
            }
        }
    }
}

/// Claims one batch and executes it sequentially.
async fn run_cycle(
    api: &WorkerApiClient,
    processor: &TaskProcessor,
    worker_id: &str,
) -> AppResult<CycleStats> {
    let claimed = api.claim_tasks().await?;
    let mut stats = CycleStats {
        claimed_tasks: u32::try_from(claimed.len()).unwrap_or(u32::MAX),
        ..CycleStats::default()
    };

    for task in claimed {
        let task = match task {
            Ok(task) => task,
            Err(error) => {
                stats.failed_tasks = stats.failed_tasks.saturating_add(1);
                warn!(worker_id, error = %error, "skipping malformed claimed task");
                continue;
            }
        };
        let (job_id, task_name, entity_id, attempt) =
            (task.job_id, task.task, task.entity_id, task.attempt);

        match processor.execute_claimed_task(worker_id, task).await {
            Ok(()) => {
                stats.executed_tasks = stats.executed_tasks.saturating_add(1);
                info!(
                    worker_id,
                    %job_id,
                    task = task_name.as_str(),
                    %entity_id,
                    attempt,
                    "backend task executed"
                );
            }
            Err(error) => {
                stats.failed_tasks = stats.failed_tasks.saturating_add(1);
                warn!(
                    worker_id,
                    %job_id,
                    task = task_name.as_str(),
                    %entity_id,
                    attempt,
                    error = %error,
                    "backend task failed"
                );
            }
        }
    }

    Ok(stats)
}

fn build_task_processor(
    pool: PgPool,
    http_client: reqwest::Client,
    backend: &BackendSettings,
) -> TaskProcessor {
    let backend: Arc<dyn CloudBackend> = match backend {
        BackendSettings::Http {
            base_url,
            max_attempts,
            retry_backoff_ms,
        } => Arc::new(HttpCloudBackend::new(
            http_client,
            base_url.as_str(),
            *max_attempts,
            *retry_backoff_ms,
        )),
        BackendSettings::Simulated { latency } => Arc::new(SimulatedCloudBackend::new(*latency)),
    };
    let executor = StateTransitionExecutor::new(
        Arc::new(PostgresStateRepository::new(pool.clone())),
        Arc::new(PostgresAuditRepository::new(pool.clone())),
    );

    TaskProcessor::new(
        Arc::new(PostgresTaskQueueRepository::new(pool.clone())),
        backend,
        executor,
        Arc::new(PostgresInstanceRepository::new(pool.clone())),
        Arc::new(PostgresCloudRepository::new(pool)),
    )
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
