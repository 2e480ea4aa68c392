use std::sync::Arc;

use nodeconductor_core::{AppError, AppResult, UserIdentity};
use nodeconductor_domain::{AuditAction, EntityKind, SshPublicKey, TaskName};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    AuditEvent, AuditRepository, CloudRepository, NewTask, ScopeFilterService, SshKeyRepository,
};

/// Application service for users' SSH public keys.
#[derive(Clone)]
pub struct SshKeyService {
    scope_filter: ScopeFilterService,
    repository: Arc<dyn SshKeyRepository>,
    cloud_repository: Arc<dyn CloudRepository>,
    audit_repository: Arc<dyn AuditRepository>,
}

impl SshKeyService {
    /// Creates a new SSH key service.
    #[must_use]
    pub fn new(
        scope_filter: ScopeFilterService,
        repository: Arc<dyn SshKeyRepository>,
        cloud_repository: Arc<dyn CloudRepository>,
        audit_repository: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            scope_filter,
            repository,
            cloud_repository,
            audit_repository,
        }
    }

    /// Lists the caller's keys; staff sees every key.
    pub async fn list_keys(&self, actor: &UserIdentity) -> AppResult<Vec<SshPublicKey>> {
        let owner = (!actor.is_staff()).then(|| actor.user_id());
        self.repository.list_keys(owner).await
    }

    /// Returns a key owned by the caller.
    pub async fn get_key(&self, actor: &UserIdentity, key_id: Uuid) -> AppResult<SshPublicKey> {
        self.repository
            .find_key(key_id)
            .await?
            .filter(|key| actor.is_staff() || key.user_id == actor.user_id())
            .ok_or_else(|| AppError::NotFound(format!("ssh key '{key_id}' not found")))
    }

    /// Stores a key and schedules pushing it to every visible membership.
    pub async fn create_key(
        &self,
        actor: &UserIdentity,
        name: &str,
        public_key: &str,
    ) -> AppResult<SshPublicKey> {
        let key = SshPublicKey::new(actor.user_id(), name, public_key)?;

        let visible = self
            .scope_filter
            .visible_ids(actor, EntityKind::CloudProjectMembership)
            .await?;
        let membership_ids: Vec<Uuid> = self
            .cloud_repository
            .list_memberships(&visible)
            .await?
            .into_iter()
            .map(|membership| membership.id)
            .collect();

        let task = NewTask::new(TaskName::PushSshPublicKeys, key.id)
            .with_payload(json!({ "membership_ids": membership_ids }));
        self.repository.create_key(key.clone(), task).await?;

        info!(
            key_id = %key.id,
            fingerprint = key.fingerprint.as_str(),
            memberships = membership_ids.len(),
            "ssh key stored"
        );

        self.audit_repository
            .record(AuditEvent {
                subject: actor.user_id().to_string(),
                action: AuditAction::SshKeyCreated,
                resource_type: "ssh_key".to_owned(),
                resource_id: key.id,
                detail: Some(key.fingerprint.clone()),
            })
            .await;

        Ok(key)
    }

    /// Deletes a key. Owner or staff.
    pub async fn delete_key(&self, actor: &UserIdentity, key_id: Uuid) -> AppResult<()> {
        let key = self.get_key(actor, key_id).await?;
        self.repository.delete_key(key.id).await
    }
}
