use chrono::{DateTime, Utc};
use nodeconductor_application::ClaimedTask;
use nodeconductor_core::{AppError, AppResult};
use nodeconductor_domain::TaskName;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::worker_config::WorkerConfig;

const WORKER_ID_HEADER: &str = "x-nodeconductor-worker-id";

/// Counters reported to the API after every poll cycle.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct CycleStats {
    pub claimed_tasks: u32,
    pub executed_tasks: u32,
    pub failed_tasks: u32,
}

#[derive(Debug, Serialize)]
struct ClaimTasksRequest {
    limit: usize,
    lease_seconds: u32,
}

#[derive(Debug, Deserialize)]
struct ClaimedTasksResponse {
    tasks: Vec<ClaimedTaskResponse>,
}

#[derive(Debug, Deserialize)]
struct ClaimedTaskResponse {
    job_id: Uuid,
    task: TaskName,
    entity_id: Uuid,
    payload: Value,
    attempt: i32,
    lease_token: String,
    leased_until: String,
}

/// Client for the API's internal worker endpoints.
pub struct WorkerApiClient {
    http_client: reqwest::Client,
    base_url: String,
    shared_secret: String,
    worker_id: String,
    claim: ClaimTasksRequest,
}

impl WorkerApiClient {
    pub fn new(http_client: reqwest::Client, config: &WorkerConfig) -> Self {
        Self {
            http_client,
            base_url: config.api_base_url.clone(),
            shared_secret: config.shared_secret.clone(),
            worker_id: config.worker_id.clone(),
            claim: ClaimTasksRequest {
                limit: config.claim_limit,
                lease_seconds: config.lease_seconds,
            },
        }
    }

    /// Leases up to the configured number of tasks. Entries with an
    /// unparseable lease expiry come back as errors so they can be counted.
    pub async fn claim_tasks(&self) -> AppResult<Vec<AppResult<ClaimedTask>>> {
        let response: ClaimedTasksResponse = self
            .post("tasks/claim", &self.claim)
            .await?
            .json()
            .await
            .map_err(|error| AppError::Internal(format!("malformed claim response: {error}")))?;

        Ok(response
            .tasks
            .into_iter()
            .map(ClaimedTaskResponse::into_claimed_task)
            .collect())
    }

    pub async fn send_heartbeat(&self, stats: CycleStats) -> AppResult<()> {
        self.post("heartbeat", &stats).await.map(|_| ())
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> AppResult<reqwest::Response> {
        let url = format!("{}/api/internal/worker/{path}", self.base_url);
        let response = self
            .http_client
            .post(url.as_str())
            .header(AUTHORIZATION, format!("Bearer {}", self.shared_secret))
            .header(WORKER_ID_HEADER, self.worker_id.as_str())
            .json(body)
            .send()
            .await
            .map_err(|error| AppError::Internal(format!("request to {url} failed: {error}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(AppError::Internal(format!(
            "{url} answered {}: {body}",
            status.as_u16()
        )))
    }
}

impl ClaimedTaskResponse {
    fn into_claimed_task(self) -> AppResult<ClaimedTask> {
        let leased_until = DateTime::parse_from_rfc3339(self.leased_until.as_str())
            .map_err(|error| {
                AppError::Validation(format!(
                    "job {} has invalid leased_until '{}': {error}",
                    self.job_id, self.leased_until
                ))
            })?
            .with_timezone(&Utc);

        Ok(ClaimedTask {
            job_id: self.job_id,
            task: self.task,
            entity_id: self.entity_id,
            payload: self.payload,
            attempt: self.attempt,
            lease_token: self.lease_token,
            leased_until,
        })
    }
}
