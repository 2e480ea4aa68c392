use std::sync::Arc;

use chrono::{DateTime, Utc};
use nodeconductor_core::{AppError, AppResult, UserIdentity};
use nodeconductor_domain::{
    AuditAction, Backup, BackupState, BackupTransition, EntityKind, TaskName,
};
use uuid::Uuid;

use crate::{
    AuditEvent, AuditRepository, AuthorizationService, BackupRepository, InstanceRepository,
    NewTask, ScopeFilterService, StateTransitionExecutor, TransitionRequest,
};

/// Input payload for backup creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateBackupInput {
    pub instance_id: Uuid,
    pub description: Option<String>,
    pub kept_until: Option<DateTime<Utc>>,
}

/// Application service for instance backups.
#[derive(Clone)]
pub struct BackupService {
    scope_filter: ScopeFilterService,
    authorization_service: AuthorizationService,
    executor: StateTransitionExecutor,
    repository: Arc<dyn BackupRepository>,
    instance_repository: Arc<dyn InstanceRepository>,
    audit_repository: Arc<dyn AuditRepository>,
}

impl BackupService {
    /// Creates a new backup service.
    #[must_use]
    pub fn new(
        scope_filter: ScopeFilterService,
        authorization_service: AuthorizationService,
        executor: StateTransitionExecutor,
        repository: Arc<dyn BackupRepository>,
        instance_repository: Arc<dyn InstanceRepository>,
        audit_repository: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            scope_filter,
            authorization_service,
            executor,
            repository,
            instance_repository,
            audit_repository,
        }
    }

    /// Lists backups of visible instances.
    pub async fn list_backups(&self, actor: &UserIdentity) -> AppResult<Vec<Backup>> {
        let visible_instances = self
            .scope_filter
            .visible_ids(actor, EntityKind::Instance)
            .await?;
        self.repository.list_backups(&visible_instances).await
    }

    /// Returns one visible backup.
    pub async fn get_backup(&self, actor: &UserIdentity, backup_id: Uuid) -> AppResult<Backup> {
        let not_found = || AppError::NotFound(format!("backup '{backup_id}' not found"));
        let backup = self
            .repository
            .find_backup(backup_id)
            .await?
            .ok_or_else(not_found)?;

        let visible_instances = self
            .scope_filter
            .visible_ids(actor, EntityKind::Instance)
            .await?;
        if visible_instances.contains(&backup.instance_id) {
            Ok(backup)
        } else {
            Err(not_found())
        }
    }

    /// Creates a backup in BACKING_UP and schedules its processing.
    pub async fn create_backup(
        &self,
        actor: &UserIdentity,
        input: CreateBackupInput,
    ) -> AppResult<Backup> {
        self.scope_filter
            .require_visible(actor, EntityKind::Instance, input.instance_id)
            .await?;
        let instance = self
            .instance_repository
            .find_instance(input.instance_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("instance '{}' not found", input.instance_id))
            })?;
        self.authorization_service
            .require_project_administrator(actor, instance.project_id)
            .await?;

        let backup = Backup {
            id: Uuid::new_v4(),
            instance_id: instance.id,
            description: input.description,
            state: BackupState::BackingUp,
            metadata: None,
            kept_until: input.kept_until,
            created_at: Utc::now(),
        };
        self.repository
            .create_backup(
                backup.clone(),
                NewTask::new(TaskName::ProcessBackup, backup.id),
            )
            .await?;

        self.audit_repository
            .record(AuditEvent {
                subject: actor.user_id().to_string(),
                action: AuditAction::BackupCreated,
                resource_type: "backup".to_owned(),
                resource_id: backup.id,
                detail: Some(format!("backup of instance {}", instance.id)),
            })
            .await;

        Ok(backup)
    }

    /// Schedules restoring a READY backup.
    pub async fn restore_backup(&self, actor: &UserIdentity, backup_id: Uuid) -> AppResult<String> {
        self.schedule(
            actor,
            backup_id,
            BackupTransition::StartRestoration,
            TaskName::RestoreBackup,
            "Backup restoration was scheduled",
        )
        .await
    }

    /// Schedules deleting a READY backup.
    pub async fn delete_backup(&self, actor: &UserIdentity, backup_id: Uuid) -> AppResult<String> {
        self.schedule(
            actor,
            backup_id,
            BackupTransition::StartDeletion,
            TaskName::DeleteBackup,
            "Backup deletion was scheduled",
        )
        .await
    }

    async fn schedule(
        &self,
        actor: &UserIdentity,
        backup_id: Uuid,
        transition: BackupTransition,
        task: TaskName,
        message: &str,
    ) -> AppResult<String> {
        let backup = self.get_backup(actor, backup_id).await?;
        let instance = self
            .instance_repository
            .find_instance(backup.instance_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("instance '{}' not found", backup.instance_id))
            })?;
        self.authorization_service
            .require_project_administrator(actor, instance.project_id)
            .await?;

        let request = TransitionRequest::new(backup_id, transition.as_str())
            .with_follow_up(NewTask::new(task, backup_id));
        self.executor
            .apply_transition::<BackupState>(actor.user_id().to_string().as_str(), request)
            .await?;

        Ok(message.to_owned())
    }
}
