use std::sync::Arc;

use nodeconductor_core::{AppError, AppResult};

use crate::{ClaimedTask, TaskQueueRepository, WorkerHeartbeatInput};

/// Application service behind the internal worker endpoints.
#[derive(Clone)]
pub struct TaskQueueService {
    repository: Arc<dyn TaskQueueRepository>,
    max_claim_limit: usize,
}

impl TaskQueueService {
    /// Creates a new task queue service.
    #[must_use]
    pub fn new(repository: Arc<dyn TaskQueueRepository>, max_claim_limit: usize) -> Self {
        Self {
            repository,
            max_claim_limit,
        }
    }

    /// Leases pending tasks to one worker.
    pub async fn claim_tasks_for_worker(
        &self,
        worker_id: &str,
        limit: usize,
        lease_seconds: u32,
    ) -> AppResult<Vec<ClaimedTask>> {
        validate_worker_id(worker_id)?;

        if limit == 0 {
            return Err(AppError::Validation(
                "limit must be greater than zero".to_owned(),
            ));
        }

        if limit > self.max_claim_limit {
            return Err(AppError::Validation(format!(
                "limit must be less than or equal to {}",
                self.max_claim_limit
            )));
        }

        if lease_seconds == 0 {
            return Err(AppError::Validation(
                "lease_seconds must be greater than zero".to_owned(),
            ));
        }

        self.repository
            .claim_tasks(worker_id, limit, lease_seconds)
            .await
    }

    /// Stores one worker heartbeat snapshot.
    pub async fn heartbeat_worker(
        &self,
        worker_id: &str,
        input: WorkerHeartbeatInput,
    ) -> AppResult<()> {
        validate_worker_id(worker_id)?;
        self.repository
            .upsert_worker_heartbeat(worker_id, input)
            .await
    }
}

pub(crate) fn validate_worker_id(worker_id: &str) -> AppResult<()> {
    if worker_id.trim().is_empty() {
        return Err(AppError::Validation(
            "worker_id must not be empty".to_owned(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use nodeconductor_core::AppError;
    use nodeconductor_domain::TaskName;
    use serde_json::json;
    use uuid::Uuid;

    use super::TaskQueueService;
    use crate::WorkerHeartbeatInput;
    use crate::test_support::{FakeStore, claimed};

    #[tokio::test]
    async fn claim_validates_worker_and_limits() {
        let service = TaskQueueService::new(Arc::new(FakeStore::default()), 25);

        assert!(matches!(
            service.claim_tasks_for_worker(" ", 1, 30).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service.claim_tasks_for_worker("worker-1", 0, 30).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service.claim_tasks_for_worker("worker-1", 26, 30).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service.claim_tasks_for_worker("worker-1", 1, 0).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn claim_returns_at_most_limit_tasks() {
        let store = Arc::new(FakeStore::default());
        {
            let mut state = store.state.lock().await;
            for _ in 0..3 {
                state.claimable.push(claimed(
                    TaskName::StartInstance,
                    Uuid::new_v4(),
                    json!({}),
                ));
            }
        }
        let service = TaskQueueService::new(store.clone(), 25);

        let tasks = service
            .claim_tasks_for_worker("worker-1", 2, 30)
            .await
            .unwrap_or_default();

        assert_eq!(tasks.len(), 2);
        assert_eq!(store.state.lock().await.claimable.len(), 1);
    }

    #[tokio::test]
    async fn heartbeat_is_stored() {
        let store = Arc::new(FakeStore::default());
        let service = TaskQueueService::new(store.clone(), 25);

        let input = WorkerHeartbeatInput {
            claimed_tasks: 2,
            executed_tasks: 1,
            failed_tasks: 1,
        };
        assert!(service.heartbeat_worker("worker-1", input).await.is_ok());
        assert_eq!(
            store.state.lock().await.heartbeats,
            vec![("worker-1".to_owned(), input)]
        );
    }
}
