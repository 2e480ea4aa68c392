use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nodeconductor_core::AppResult;
use nodeconductor_domain::TaskName;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Backend task to enqueue for asynchronous execution.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    /// Task to run.
    pub task: TaskName,
    /// Entity the task operates on.
    pub entity_id: Uuid,
    /// Task arguments.
    pub payload: Value,
}

impl NewTask {
    /// Creates a task with an empty payload.
    #[must_use]
    pub fn new(task: TaskName, entity_id: Uuid) -> Self {
        Self {
            task,
            entity_id,
            payload: Value::Object(Map::new()),
        }
    }

    /// Replaces the task arguments.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Task leased by one worker.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimedTask {
    /// Queue row identifier.
    pub job_id: Uuid,
    /// Task to run.
    pub task: TaskName,
    /// Entity the task operates on.
    pub entity_id: Uuid,
    /// Task arguments.
    pub payload: Value,
    /// 1-based attempt counter.
    pub attempt: i32,
    /// Token proving lease ownership on completion.
    pub lease_token: String,
    /// Lease expiry.
    pub leased_until: DateTime<Utc>,
}

/// Worker counters reported after each poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerHeartbeatInput {
    /// Tasks leased in the cycle.
    pub claimed_tasks: u32,
    /// Tasks finished successfully.
    pub executed_tasks: u32,
    /// Tasks that failed.
    pub failed_tasks: u32,
}

/// Repository port for the persisted task queue.
#[async_trait]
pub trait TaskQueueRepository: Send + Sync {
    /// Enqueues one task outside any state transition.
    async fn enqueue(&self, task: NewTask) -> AppResult<Uuid>;

    /// Leases pending or expired tasks for one worker.
    async fn claim_tasks(
        &self,
        worker_id: &str,
        limit: usize,
        lease_seconds: u32,
    ) -> AppResult<Vec<ClaimedTask>>;

    /// Marks one leased task as completed.
    async fn complete_task(&self, job_id: Uuid, worker_id: &str, lease_token: &str)
    -> AppResult<()>;

    /// Marks one leased task as failed with an error message.
    async fn fail_task(
        &self,
        job_id: Uuid,
        worker_id: &str,
        lease_token: &str,
        error_message: &str,
    ) -> AppResult<()>;

    /// Updates one worker heartbeat snapshot.
    async fn upsert_worker_heartbeat(
        &self,
        worker_id: &str,
        input: WorkerHeartbeatInput,
    ) -> AppResult<()>;
}

/// Port performing the physical effect of a task on the cloud backend.
#[async_trait]
pub trait CloudBackend: Send + Sync {
    /// Executes the task and returns backend-provided data.
    async fn execute(&self, task: &ClaimedTask) -> AppResult<Value>;
}
