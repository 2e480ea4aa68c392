//! In-process cloud backend for development and tests.

use std::time::Duration;

use async_trait::async_trait;
use nodeconductor_application::{ClaimedTask, CloudBackend};
use nodeconductor_core::AppResult;
use nodeconductor_domain::TaskName;
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

/// Backend that succeeds every task after an optional delay.
///
/// Membership syncs receive a generated tenant id, account syncs a fixed
/// flavor catalogue and backups snapshot identifiers.
#[derive(Debug, Clone, Default)]
pub struct SimulatedCloudBackend {
    latency: Duration,
}

impl SimulatedCloudBackend {
    /// Creates a backend answering after `latency`.
    #[must_use]
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

fn flavor_catalogue() -> Value {
    json!({
        "flavors": [
            {"name": "m1.small", "cores": 1, "ram": 2048, "disk": 20480},
            {"name": "m1.medium", "cores": 2, "ram": 4096, "disk": 40960},
            {"name": "m1.large", "cores": 4, "ram": 8192, "disk": 81920},
        ]
    })
}

#[async_trait]
impl CloudBackend for SimulatedCloudBackend {
    async fn execute(&self, task: &ClaimedTask) -> AppResult<Value> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        info!(
            job_id = %task.job_id,
            task = task.task.as_str(),
            entity_id = %task.entity_id,
            "simulated cloud backend executed task"
        );

        Ok(match task.task {
            TaskName::SyncCloudAccount => flavor_catalogue(),
            TaskName::SyncCloudMembership => json!({
                "tenant_id": task.entity_id.simple().to_string(),
            }),
            TaskName::ProcessBackup => json!({
                "system_snapshot_id": Uuid::new_v4(),
                "data_snapshot_id": Uuid::new_v4(),
                "source_instance_id": task.entity_id,
            }),
            _ => json!({}),
        })
    }
}
