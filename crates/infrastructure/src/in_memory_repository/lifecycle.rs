use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use nodeconductor_application::{
    AuditEvent, AuditRepository, ClaimedTask, NewTask, StateSnapshot, StateWrite,
    StatefulRepository, StatsRepository, TaskQueueRepository, WorkerHeartbeatInput,
};
use nodeconductor_core::{AppError, AppResult};
use nodeconductor_domain::{
    BackupState, EntityKind, InstanceState, MembershipQuotas, StateMachine, StatefulKind,
    TransitionEffect, VisibleIds,
};
use tracing::debug;
use uuid::Uuid;

use super::{InMemoryRepository, InMemoryState, JobStatus};

impl InMemoryState {
    fn stored_state(&self, kind: StatefulKind, id: Uuid) -> Option<&'static str> {
        match kind {
            StatefulKind::Instance => self.instances.get(&id).map(|instance| instance.state.as_str()),
            StatefulKind::Backup => self.backups.get(&id).map(|backup| backup.state.as_str()),
        }
    }

    fn write_state(&mut self, write: &StateWrite) -> AppResult<()> {
        match (write.kind, &write.effect) {
            (StatefulKind::Instance, TransitionEffect::BackupMetadata(_)) => Err(
                AppError::Internal("backup metadata cannot be written to an instance".to_owned()),
            ),
            (StatefulKind::Instance, effect) => {
                let target = InstanceState::parse(write.target_state)?;
                let Some(instance) = self.instances.get_mut(&write.id) else {
                    return Ok(());
                };
                instance.state = target;
                match effect {
                    TransitionEffect::InstanceFlavor {
                        flavor_id,
                        cores,
                        ram,
                    } => {
                        instance.flavor_id = *flavor_id;
                        instance.cores = *cores;
                        instance.ram = *ram;
                    }
                    TransitionEffect::InstanceDataVolume { size } => {
                        instance.data_volume_size = *size;
                    }
                    TransitionEffect::InstanceStarted => instance.start_time = Some(Utc::now()),
                    _ => {}
                }
                Ok(())
            }
            (StatefulKind::Backup, TransitionEffect::None | TransitionEffect::BackupMetadata(_)) => {
                let target = BackupState::parse(write.target_state)?;
                let Some(backup) = self.backups.get_mut(&write.id) else {
                    return Ok(());
                };
                backup.state = target;
                if let TransitionEffect::BackupMetadata(metadata) = &write.effect {
                    backup.metadata = Some(metadata.clone());
                }
                Ok(())
            }
            (StatefulKind::Backup, _) => Err(AppError::Internal(
                "instance fields cannot be written to a backup".to_owned(),
            )),
        }
    }

    fn customer_of(&self, kind: EntityKind, id: Uuid) -> Option<Uuid> {
        match kind {
            EntityKind::Project => self.projects.get(&id).map(|project| project.customer_id),
            EntityKind::ProjectGroup => self.project_groups.get(&id).map(|group| group.customer_id),
            EntityKind::Instance => self
                .instances
                .get(&id)
                .and_then(|instance| self.projects.get(&instance.project_id))
                .map(|project| project.customer_id),
            _ => None,
        }
    }

    fn creation_times(&self, kind: EntityKind) -> AppResult<Vec<(Uuid, DateTime<Utc>)>> {
        match kind {
            EntityKind::Customer => Ok(self
                .customers
                .values()
                .map(|customer| (customer.id, customer.created_at))
                .collect()),
            EntityKind::ProjectGroup => Ok(self
                .project_groups
                .values()
                .map(|group| (group.id, group.created_at))
                .collect()),
            EntityKind::Project => Ok(self
                .projects
                .values()
                .map(|project| (project.id, project.created_at))
                .collect()),
            EntityKind::Instance => Ok(self
                .instances
                .values()
                .map(|instance| (instance.id, instance.created_at))
                .collect()),
            other => Err(AppError::Validation(format!(
                "creation statistics are not available for {}",
                other.as_str()
            ))),
        }
    }
}

#[async_trait]
impl StatefulRepository for InMemoryRepository {
    async fn load_state(&self, kind: StatefulKind, id: Uuid) -> AppResult<Option<StateSnapshot>> {
        let state = self.state.read().await;
        Ok(state.stored_state(kind, id).map(|stored| StateSnapshot {
            state: stored.to_owned(),
            version: state.versions.get(&id).copied().unwrap_or(1),
        }))
    }

    async fn compare_and_write(&self, write: StateWrite) -> AppResult<bool> {
        let mut state = self.state.write().await;
        let version = state.versions.get(&write.id).copied().unwrap_or(1);
        let matches = version == write.expected_version
            && state.stored_state(write.kind, write.id) == Some(write.expected_state.as_str());
        if !matches {
            return Ok(false);
        }

        state.write_state(&write)?;
        state.versions.insert(write.id, version + 1);
        if let Some(task) = write.follow_up {
            state.enqueue(task);
        }
        Ok(true)
    }
}

#[async_trait]
impl TaskQueueRepository for InMemoryRepository {
    async fn enqueue(&self, task: NewTask) -> AppResult<Uuid> {
        Ok(self.state.write().await.enqueue(task))
    }

    async fn claim_tasks(
        &self,
        worker_id: &str,
        limit: usize,
        lease_seconds: u32,
    ) -> AppResult<Vec<ClaimedTask>> {
        let now = Utc::now();
        let leased_until = now + Duration::seconds(i64::from(lease_seconds));
        let mut state = self.state.write().await;

        let claimed = state
            .jobs
            .iter_mut()
            .filter(|job| {
                job.status == JobStatus::Pending
                    || (job.status == JobStatus::Leased
                        && job.lease_expires_at.is_some_and(|expires| expires < now))
            })
            .take(limit)
            .map(|job| {
                let lease_token = Uuid::new_v4().to_string();
                job.status = JobStatus::Leased;
                job.attempts += 1;
                job.leased_by = Some(worker_id.to_owned());
                job.lease_token = Some(lease_token.clone());
                job.lease_expires_at = Some(leased_until);

                ClaimedTask {
                    job_id: job.id,
                    task: job.task.task,
                    entity_id: job.task.entity_id,
                    payload: job.task.payload.clone(),
                    attempt: job.attempts,
                    lease_token,
                    leased_until,
                }
            })
            .collect();

        Ok(claimed)
    }

    async fn complete_task(
        &self,
        job_id: Uuid,
        worker_id: &str,
        lease_token: &str,
    ) -> AppResult<()> {
        self.finish_job(job_id, worker_id, lease_token, JobStatus::Completed, None)
            .await
    }

    async fn fail_task(
        &self,
        job_id: Uuid,
        worker_id: &str,
        lease_token: &str,
        error_message: &str,
    ) -> AppResult<()> {
        self.finish_job(
            job_id,
            worker_id,
            lease_token,
            JobStatus::Failed,
            Some(error_message.to_owned()),
        )
        .await
    }

    async fn upsert_worker_heartbeat(
        &self,
        worker_id: &str,
        input: WorkerHeartbeatInput,
    ) -> AppResult<()> {
        debug!(
            worker_id,
            claimed = input.claimed_tasks,
            executed = input.executed_tasks,
            failed = input.failed_tasks,
            "worker heartbeat"
        );
        Ok(())
    }
}

impl InMemoryRepository {
    async fn finish_job(
        &self,
        job_id: Uuid,
        worker_id: &str,
        lease_token: &str,
        status: JobStatus,
        error_message: Option<String>,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        let job = state
            .jobs
            .iter_mut()
            .find(|job| {
                job.id == job_id
                    && job.status == JobStatus::Leased
                    && job.leased_by.as_deref() == Some(worker_id)
                    && job.lease_token.as_deref() == Some(lease_token)
            })
            .ok_or_else(|| {
                AppError::Conflict(format!(
                    "task '{job_id}' is not currently leased by worker '{worker_id}' with matching lease token"
                ))
            })?;

        job.status = status;
        job.leased_by = None;
        job.lease_token = None;
        job.lease_expires_at = None;
        job.last_error = error_message;
        Ok(())
    }
}

#[async_trait]
impl AuditRepository for InMemoryRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        self.state.write().await.audit.push(event);
        Ok(())
    }
}

#[async_trait]
impl StatsRepository for InMemoryRepository {
    async fn count_per_customer(
        &self,
        kind: EntityKind,
        visible: &VisibleIds,
    ) -> AppResult<BTreeMap<Uuid, i64>> {
        let state = self.state.read().await;
        let ids: Vec<Uuid> = match kind {
            EntityKind::Project => state.projects.keys().copied().collect(),
            EntityKind::ProjectGroup => state.project_groups.keys().copied().collect(),
            EntityKind::Instance => state.instances.keys().copied().collect(),
            other => {
                return Err(AppError::Validation(format!(
                    "per-customer counts are not available for {}",
                    other.as_str()
                )));
            }
        };

        let mut counts = BTreeMap::new();
        for id in visible.filter(ids, |id| *id) {
            if let Some(customer_id) = state.customer_of(kind, id) {
                *counts.entry(customer_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn list_membership_quotas(
        &self,
        memberships: &VisibleIds,
    ) -> AppResult<Vec<MembershipQuotas>> {
        let state = self.state.read().await;
        let rows = state
            .memberships
            .keys()
            .map(|membership_id| {
                state
                    .quotas
                    .get(membership_id)
                    .cloned()
                    .unwrap_or(MembershipQuotas {
                        membership_id: *membership_id,
                        quota: None,
                        usage: None,
                    })
            })
            .collect();

        Ok(memberships.filter(rows, |quotas| quotas.membership_id))
    }

    async fn list_creation_times(
        &self,
        kind: EntityKind,
        visible: &VisibleIds,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<DateTime<Utc>>> {
        let state = self.state.read().await;
        let mut times: Vec<DateTime<Utc>> = visible
            .filter(state.creation_times(kind)?, |(id, _)| *id)
            .into_iter()
            .map(|(_, created_at)| created_at)
            .filter(|created_at| *created_at >= from && *created_at <= to)
            .collect();
        times.sort();
        Ok(times)
    }
}
