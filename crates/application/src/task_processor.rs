//! Worker-side task execution.
//!
//! A claimed task is performed through the [`CloudBackend`] and its outcome
//! is reported through the [`StateTransitionExecutor`]: success moves the
//! entity to its resting state, failure marks it erred. The queue job is then
//! completed or failed with the lease token.

use std::sync::Arc;

use nodeconductor_core::{AppError, AppResult};
use nodeconductor_domain::{
    BackupState, BackupTransition, Flavor, InstanceState, InstanceTransition,
    SynchronizationState, TaskName, TransitionEffect,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::task_service::validate_worker_id;
use crate::{
    ClaimedTask, CloudBackend, CloudRepository, InstanceRepository, StateTransitionExecutor,
    TaskQueueRepository, TransitionRequest,
};

#[derive(Debug, Deserialize)]
struct BackendFlavor {
    name: String,
    cores: i32,
    ram: i32,
    disk: i32,
}

/// Executes claimed tasks and records their outcome.
#[derive(Clone)]
pub struct TaskProcessor {
    queue_repository: Arc<dyn TaskQueueRepository>,
    backend: Arc<dyn CloudBackend>,
    executor: StateTransitionExecutor,
    instance_repository: Arc<dyn InstanceRepository>,
    cloud_repository: Arc<dyn CloudRepository>,
}

impl TaskProcessor {
    /// Creates a new task processor.
    #[must_use]
    pub fn new(
        queue_repository: Arc<dyn TaskQueueRepository>,
        backend: Arc<dyn CloudBackend>,
        executor: StateTransitionExecutor,
        instance_repository: Arc<dyn InstanceRepository>,
        cloud_repository: Arc<dyn CloudRepository>,
    ) -> Self {
        Self {
            queue_repository,
            backend,
            executor,
            instance_repository,
            cloud_repository,
        }
    }

    /// Executes one claimed task and finalizes its queue job.
    pub async fn execute_claimed_task(&self, worker_id: &str, task: ClaimedTask) -> AppResult<()> {
        validate_worker_id(worker_id)?;

        if task.lease_token.trim().is_empty() {
            return Err(AppError::Validation(
                "claimed task lease_token must not be empty".to_owned(),
            ));
        }

        let subject = format!("worker:{worker_id}");
        let outcome = self.backend.execute(&task).await;
        let result = self.record_outcome(subject.as_str(), &task, outcome).await;

        match result {
            Ok(()) => {
                self.queue_repository
                    .complete_task(task.job_id, worker_id, task.lease_token.as_str())
                    .await?;
                info!(
                    job_id = %task.job_id,
                    task = task.task.as_str(),
                    entity_id = %task.entity_id,
                    "task completed"
                );
                Ok(())
            }
            Err(error) => {
                let error_message = error.to_string();
                if let Err(mark_error) = self
                    .queue_repository
                    .fail_task(
                        task.job_id,
                        worker_id,
                        task.lease_token.as_str(),
                        error_message.as_str(),
                    )
                    .await
                {
                    return Err(AppError::Internal(format!(
                        "failed to execute task '{}': {error}; additionally failed to mark task failed: {mark_error}",
                        task.job_id
                    )));
                }

                Err(error)
            }
        }
    }

    async fn record_outcome(
        &self,
        subject: &str,
        task: &ClaimedTask,
        outcome: AppResult<Value>,
    ) -> AppResult<()> {
        let id = task.entity_id;
        match task.task {
            TaskName::ProvisionInstance | TaskName::StartInstance => {
                self.instance_failure(subject, id, outcome).await?;
                self.transition_instance(
                    subject,
                    TransitionRequest::new(id, InstanceTransition::SetOnline.as_str())
                        .with_effect(TransitionEffect::InstanceStarted),
                )
                .await
            }
            TaskName::StopInstance
            | TaskName::UpdateInstanceFlavor
            | TaskName::ExtendInstanceDisk => {
                self.instance_failure(subject, id, outcome).await?;
                self.transition_instance(
                    subject,
                    TransitionRequest::new(id, InstanceTransition::SetOffline.as_str()),
                )
                .await
            }
            TaskName::DeleteInstance => {
                self.instance_failure(subject, id, outcome).await?;
                if self
                    .instance_repository
                    .delete_instance_in_state(id, InstanceState::Deleting)
                    .await?
                {
                    info!(instance_id = %id, "instance removed");
                    Ok(())
                } else {
                    Err(AppError::Conflict(format!(
                        "instance '{id}' is no longer in deleting state"
                    )))
                }
            }
            TaskName::PushInstanceSecurityGroups | TaskName::PushSshPublicKeys => {
                outcome.map(|_| ())
            }
            TaskName::SyncCloudAccount => {
                let response = outcome?;
                let flavors = parse_flavors(id, &response)?;
                let count = flavors.len();
                self.cloud_repository.upsert_flavors(id, flavors).await?;
                info!(cloud_id = %id, flavors = count, "cloud account synchronized");
                Ok(())
            }
            TaskName::SyncCloudMembership => match outcome {
                Ok(response) => {
                    let tenant_id = response
                        .get("tenant_id")
                        .and_then(Value::as_str)
                        .map(str::to_owned);
                    self.cloud_repository
                        .set_membership_state(id, SynchronizationState::InSync, tenant_id)
                        .await
                }
                Err(error) => {
                    self.cloud_repository
                        .set_membership_state(id, SynchronizationState::Erred, None)
                        .await?;
                    Err(error)
                }
            },
            TaskName::ProcessBackup => {
                let metadata = self.backup_failure(subject, id, outcome).await?;
                self.transition_backup(
                    subject,
                    TransitionRequest::new(id, BackupTransition::ConfirmBackup.as_str())
                        .with_effect(TransitionEffect::BackupMetadata(metadata)),
                )
                .await
            }
            TaskName::RestoreBackup => {
                self.backup_failure(subject, id, outcome).await?;
                self.transition_backup(
                    subject,
                    TransitionRequest::new(id, BackupTransition::ConfirmRestoration.as_str()),
                )
                .await
            }
            TaskName::DeleteBackup => {
                self.backup_failure(subject, id, outcome).await?;
                self.transition_backup(
                    subject,
                    TransitionRequest::new(id, BackupTransition::ConfirmDeletion.as_str()),
                )
                .await
            }
        }
    }

    async fn transition_instance(&self, subject: &str, request: TransitionRequest) -> AppResult<()> {
        self.executor
            .apply_transition::<InstanceState>(subject, request)
            .await?;
        Ok(())
    }

    async fn transition_backup(&self, subject: &str, request: TransitionRequest) -> AppResult<()> {
        self.executor
            .apply_transition::<BackupState>(subject, request)
            .await?;
        Ok(())
    }

    async fn instance_failure(
        &self,
        subject: &str,
        id: Uuid,
        outcome: AppResult<Value>,
    ) -> AppResult<Value> {
        match outcome {
            Ok(response) => Ok(response),
            Err(error) => {
                let request = TransitionRequest::new(id, InstanceTransition::SetErred.as_str());
                if let Err(mark_error) = self.transition_instance(subject, request).await {
                    warn!(instance_id = %id, error = %mark_error, "failed to mark instance erred");
                }
                Err(error)
            }
        }
    }

    async fn backup_failure(
        &self,
        subject: &str,
        id: Uuid,
        outcome: AppResult<Value>,
    ) -> AppResult<Value> {
        match outcome {
            Ok(response) => Ok(response),
            Err(error) => {
                let request = TransitionRequest::new(id, BackupTransition::SetErred.as_str());
                if let Err(mark_error) = self.transition_backup(subject, request).await {
                    warn!(backup_id = %id, error = %mark_error, "failed to mark backup erred");
                }
                Err(error)
            }
        }
    }
}

fn parse_flavors(cloud_id: Uuid, response: &Value) -> AppResult<Vec<Flavor>> {
    let Some(flavors) = response.get("flavors") else {
        return Ok(Vec::new());
    };

    let flavors: Vec<BackendFlavor> = serde_json::from_value(flavors.clone()).map_err(|error| {
        AppError::Internal(format!("backend returned malformed flavors: {error}"))
    })?;

    Ok(flavors
        .into_iter()
        .map(|flavor| Flavor {
            id: Uuid::new_v4(),
            cloud_id,
            name: flavor.name,
            cores: flavor.cores,
            ram: flavor.ram,
            disk: flavor.disk,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use nodeconductor_core::{AppError, AppResult};
    use nodeconductor_domain::{
        BackupState, InstanceState, SynchronizationState, TaskName,
    };
    use serde_json::{Value, json};
    use uuid::Uuid;

    use super::TaskProcessor;
    use crate::test_support::{FakeStore, claimed, executor};
    use crate::{ClaimedTask, CloudBackend};

    struct ScriptedBackend {
        response: Result<Value, String>,
    }

    #[async_trait]
    impl CloudBackend for ScriptedBackend {
        async fn execute(&self, _task: &ClaimedTask) -> AppResult<Value> {
            self.response.clone().map_err(AppError::Internal)
        }
    }

    fn processor(store: &Arc<FakeStore>, response: Result<Value, String>) -> TaskProcessor {
        TaskProcessor::new(
            store.clone(),
            Arc::new(ScriptedBackend { response }),
            executor(store),
            store.clone(),
            store.clone(),
        )
    }

    async fn instance_in(store: &Arc<FakeStore>, state: InstanceState) -> (Uuid, Uuid) {
        let customer_id = store.add_customer().await;
        let project_id = store.add_project(customer_id, Vec::new()).await;
        let cloud_id = store.add_cloud(customer_id).await;
        let membership_id = store
            .add_membership(cloud_id, project_id, SynchronizationState::New)
            .await;
        (store.add_instance(membership_id, state).await, membership_id)
    }

    #[tokio::test]
    async fn successful_start_brings_instance_online() {
        let store = Arc::new(FakeStore::default());
        let (instance_id, _) = instance_in(&store, InstanceState::Starting).await;
        let task = claimed(TaskName::StartInstance, instance_id, json!({}));
        let job_id = task.job_id;

        let result = processor(&store, Ok(json!({})))
            .execute_claimed_task("worker-1", task)
            .await;

        assert!(result.is_ok());
        let state = store.state.lock().await;
        let instance = state.instances.get(&instance_id);
        assert_eq!(instance.map(|instance| instance.state), Some(InstanceState::Online));
        assert!(instance.is_some_and(|instance| instance.start_time.is_some()));
        assert_eq!(state.completed, vec![job_id]);
    }

    #[tokio::test]
    async fn failed_provisioning_marks_instance_erred_and_fails_job() {
        let store = Arc::new(FakeStore::default());
        let (instance_id, _) = instance_in(&store, InstanceState::Provisioning).await;
        let task = claimed(TaskName::ProvisionInstance, instance_id, json!({}));

        let result = processor(&store, Err("quota exceeded".to_owned()))
            .execute_claimed_task("worker-1", task)
            .await;

        assert!(result.is_err());
        assert_eq!(
            store.instance_state(instance_id).await,
            Some(InstanceState::Erred)
        );
        let state = store.state.lock().await;
        assert!(state.completed.is_empty());
        assert_eq!(state.failed.len(), 1);
        assert!(state.failed[0].1.contains("quota exceeded"));
    }

    #[tokio::test]
    async fn deletion_removes_instance_only_from_deleting() {
        let store = Arc::new(FakeStore::default());
        let (deleting, _) = instance_in(&store, InstanceState::Deleting).await;
        let (online, _) = instance_in(&store, InstanceState::Online).await;
        let processor = processor(&store, Ok(json!({})));

        assert!(
            processor
                .execute_claimed_task("worker-1", claimed(TaskName::DeleteInstance, deleting, json!({})))
                .await
                .is_ok()
        );
        assert!(
            processor
                .execute_claimed_task("worker-1", claimed(TaskName::DeleteInstance, online, json!({})))
                .await
                .is_err()
        );
        assert_eq!(store.instance_state(deleting).await, None);
        assert_eq!(store.instance_state(online).await, Some(InstanceState::Online));
    }

    #[tokio::test]
    async fn backup_processing_stores_metadata() {
        let store = Arc::new(FakeStore::default());
        let (instance_id, _) = instance_in(&store, InstanceState::Online).await;
        let backup_id = store.add_backup(instance_id, BackupState::BackingUp).await;

        let result = processor(&store, Ok(json!({"snapshot_id": "snap-7"})))
            .execute_claimed_task("worker-1", claimed(TaskName::ProcessBackup, backup_id, json!({})))
            .await;

        assert!(result.is_ok());
        let state = store.state.lock().await;
        let backup = state.backups.get(&backup_id);
        assert_eq!(backup.map(|backup| backup.state), Some(BackupState::Ready));
        assert_eq!(
            backup.and_then(|backup| backup.metadata.clone()),
            Some(json!({"snapshot_id": "snap-7"}))
        );
    }

    #[tokio::test]
    async fn failed_restoration_marks_backup_erred() {
        let store = Arc::new(FakeStore::default());
        let (instance_id, _) = instance_in(&store, InstanceState::Online).await;
        let backup_id = store.add_backup(instance_id, BackupState::Restoring).await;

        let result = processor(&store, Err("volume missing".to_owned()))
            .execute_claimed_task("worker-1", claimed(TaskName::RestoreBackup, backup_id, json!({})))
            .await;

        assert!(result.is_err());
        assert_eq!(store.backup_state(backup_id).await, Some(BackupState::Erred));
    }

    #[tokio::test]
    async fn membership_sync_records_tenant() {
        let store = Arc::new(FakeStore::default());
        let (_, membership_id) = instance_in(&store, InstanceState::Online).await;

        let result = processor(&store, Ok(json!({"tenant_id": "tenant-42"})))
            .execute_claimed_task(
                "worker-1",
                claimed(TaskName::SyncCloudMembership, membership_id, json!({})),
            )
            .await;

        assert!(result.is_ok());
        let state = store.state.lock().await;
        let membership = state.memberships.get(&membership_id);
        assert_eq!(
            membership.map(|membership| membership.state),
            Some(SynchronizationState::InSync)
        );
        assert_eq!(
            membership.and_then(|membership| membership.tenant_id.clone()),
            Some("tenant-42".to_owned())
        );
    }

    #[tokio::test]
    async fn account_sync_upserts_flavors() {
        let store = Arc::new(FakeStore::default());
        let customer_id = store.add_customer().await;
        let cloud_id = store.add_cloud(customer_id).await;
        let response = json!({"flavors": [
            {"name": "m1.tiny", "cores": 1, "ram": 512, "disk": 1},
            {"name": "m1.small", "cores": 1, "ram": 2048, "disk": 20}
        ]});
        let processor = processor(&store, Ok(response));

        for _ in 0..2 {
            let result = processor
                .execute_claimed_task(
                    "worker-1",
                    claimed(TaskName::SyncCloudAccount, cloud_id, json!({})),
                )
                .await;
            assert!(result.is_ok());
        }

        assert_eq!(store.state.lock().await.flavors.len(), 2);
    }

    #[tokio::test]
    async fn empty_lease_token_is_rejected() {
        let store = Arc::new(FakeStore::default());
        let mut task = claimed(TaskName::StartInstance, Uuid::new_v4(), json!({}));
        task.lease_token = " ".to_owned();

        let result = processor(&store, Ok(json!({})))
            .execute_claimed_task("worker-1", task)
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
