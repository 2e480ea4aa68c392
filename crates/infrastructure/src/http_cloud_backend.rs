//! Cloud backend reached over HTTP.
//!
//! Each task is posted as JSON to `{base_url}/tasks/{task_name}` with the
//! queue job id as `Idempotency-Key`, so a retried delivery is recognised by
//! the backend. Server errors and `429` are retried with linear backoff; any
//! other non-success status fails the task immediately.

use std::time::Duration;

use async_trait::async_trait;
use nodeconductor_application::{ClaimedTask, CloudBackend};
use nodeconductor_core::{AppError, AppResult};
use serde_json::{Value, json};
use tracing::warn;

/// HTTP implementation of the cloud backend port.
pub struct HttpCloudBackend {
    http_client: reqwest::Client,
    base_url: String,
    max_attempts: u8,
    retry_backoff_ms: u64,
}

impl HttpCloudBackend {
    /// Creates a backend posting tasks below `base_url`.
    #[must_use]
    pub fn new(
        http_client: reqwest::Client,
        base_url: impl Into<String>,
        max_attempts: u8,
        retry_backoff_ms: u64,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            max_attempts: max_attempts.max(1),
            retry_backoff_ms: retry_backoff_ms.max(50),
        }
    }

    fn task_url(&self, task: &ClaimedTask) -> String {
        format!("{}/tasks/{}", self.base_url, task.task.as_str())
    }
}

#[async_trait]
impl CloudBackend for HttpCloudBackend {
    async fn execute(&self, task: &ClaimedTask) -> AppResult<Value> {
        let url = self.task_url(task);
        let body = json!({
            "task": task.task.as_str(),
            "entity_id": task.entity_id,
            "payload": task.payload,
            "attempt": task.attempt,
        });
        let idempotency_key = task.job_id.to_string();

        let mut attempt = 0_u8;
        let mut last_error: Option<String> = None;

        while attempt < self.max_attempts {
            attempt = attempt.saturating_add(1);
            let response = self
                .http_client
                .post(url.as_str())
                .header("Idempotency-Key", idempotency_key.as_str())
                .json(&body)
                .send()
                .await;

            match response {
                Ok(response) if response.status().is_success() => {
                    if response.content_length() == Some(0) {
                        return Ok(Value::Null);
                    }
                    return response.json::<Value>().await.map_err(|error| {
                        AppError::Internal(format!(
                            "cloud backend returned malformed body for '{}': {error}",
                            task.task.as_str()
                        ))
                    });
                }
                Ok(response)
                    if response.status().is_server_error()
                        || response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS =>
                {
                    last_error = Some(format!(
                        "transient HTTP status {} from cloud backend for task '{}'",
                        response.status(),
                        task.job_id
                    ));
                }
                Ok(response) => {
                    let status = response.status();
                    let text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "<response body unavailable>".to_owned());
                    return Err(AppError::Validation(format!(
                        "cloud backend rejected '{}' with status {status}: {text}",
                        task.task.as_str()
                    )));
                }
                Err(error) => {
                    last_error = Some(format!("cloud backend transport error: {error}"));
                }
            }

            if attempt < self.max_attempts {
                warn!(
                    job_id = %task.job_id,
                    attempt,
                    error = last_error.as_deref().unwrap_or_default(),
                    "retrying cloud backend call"
                );
                let delay = self.retry_backoff_ms.saturating_mul(u64::from(attempt));
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        Err(AppError::Internal(last_error.unwrap_or_else(|| {
            "cloud backend call exhausted retries".to_owned()
        })))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use nodeconductor_application::ClaimedTask;
    use nodeconductor_domain::TaskName;
    use serde_json::json;
    use uuid::Uuid;

    use super::HttpCloudBackend;

    #[test]
    fn task_url_strips_trailing_slash_of_base() {
        let backend = HttpCloudBackend::new(reqwest::Client::new(), "http://backend:9000/", 3, 0);
        let task = ClaimedTask {
            job_id: Uuid::new_v4(),
            task: TaskName::SyncCloudMembership,
            entity_id: Uuid::new_v4(),
            payload: json!({}),
            attempt: 1,
            lease_token: "token".to_owned(),
            leased_until: Utc::now(),
        };

        assert_eq!(
            backend.task_url(&task),
            "http://backend:9000/tasks/sync_cloud_membership"
        );
    }
}
