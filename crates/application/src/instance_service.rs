//! VM instance lifecycle.
//!
//! Creation and edits write the instance row directly. Every later state
//! change goes through the [`StateTransitionExecutor`].

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use nodeconductor_core::{AppError, AppResult, NonEmptyString, UserIdentity};
use nodeconductor_domain::{
    AuditAction, CloudProjectMembership, EntityKind, Instance, InstanceOperation, InstanceState,
    NewInstance, ResizeTarget, StateMachine, SynchronizationState, TaskName,
};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    AuditEvent, AuditRepository, AuthorizationService, CloudRepository, InstanceListQuery,
    InstanceRepository, InstanceUpdate, NewTask, ScopeFilterService, StateChangeReason,
    StateTransitionExecutor, TransitionRequest,
};

mod actions;


/// Input payload for instance creation.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateInstanceInput {
    pub project_id: Uuid,
    pub flavor_id: Uuid,
    pub hostname: String,
    pub description: Option<String>,
    pub template_name: Option<String>,
    pub agreed_sla: Option<f64>,
    /// Defaults to the flavor disk size.
    pub data_volume_size: Option<i32>,
    pub security_group_ids: Vec<Uuid>,
    pub ssh_key_id: Option<Uuid>,
}

/// Input payload for instance edits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateInstanceInput {
    pub hostname: Option<String>,
    pub description: Option<String>,
    pub security_group_ids: Option<Vec<Uuid>>,
}

/// Input payload for the resize action. Exactly one field must be set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResizeInstanceInput {
    pub flavor_id: Option<Uuid>,
    pub disk_size: Option<i32>,
}

/// Accepted asynchronous operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationScheduled {
    pub operation: InstanceOperation,
    pub message: String,
}

/// Application service for VM instances.
#[derive(Clone)]
pub struct InstanceService {
    scope_filter: ScopeFilterService,
    authorization_service: AuthorizationService,
    executor: StateTransitionExecutor,
    repository: Arc<dyn InstanceRepository>,
    cloud_repository: Arc<dyn CloudRepository>,
    audit_repository: Arc<dyn AuditRepository>,
}

impl InstanceService {
    /// Creates a new instance service.
    #[must_use]
    pub fn new(
        scope_filter: ScopeFilterService,
        authorization_service: AuthorizationService,
        executor: StateTransitionExecutor,
        repository: Arc<dyn InstanceRepository>,
        cloud_repository: Arc<dyn CloudRepository>,
        audit_repository: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            scope_filter,
            authorization_service,
            executor,
            repository,
            cloud_repository,
            audit_repository,
        }
    }

    /// Lists visible instances.
    pub async fn list_instances(
        &self,
        actor: &UserIdentity,
        query: &InstanceListQuery,
    ) -> AppResult<Vec<Instance>> {
        let visible = self
            .scope_filter
            .visible_ids(actor, EntityKind::Instance)
            .await?;
        self.repository.list_instances(&visible, query).await
    }

    /// Returns one visible instance.
    pub async fn get_instance(
        &self,
        actor: &UserIdentity,
        instance_id: Uuid,
    ) -> AppResult<Instance> {
        self.scope_filter
            .require_visible(actor, EntityKind::Instance, instance_id)
            .await?;
        self.repository
            .find_instance(instance_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("instance '{instance_id}' not found")))
    }

    /// Creates an instance in PROVISIONING and schedules its provisioning.
    pub async fn create_instance(
        &self,
        actor: &UserIdentity,
        input: CreateInstanceInput,
    ) -> AppResult<Instance> {
        self.scope_filter
            .require_visible(actor, EntityKind::Project, input.project_id)
            .await?;
        self.authorization_service
            .require_project_administrator(actor, input.project_id)
            .await?;

        let flavor = self
            .cloud_repository
            .find_flavor(input.flavor_id)
            .await?
            .ok_or_else(|| {
                AppError::Validation(format!("flavor '{}' does not exist", input.flavor_id))
            })?;

        let membership = self
            .cloud_repository
            .find_membership_by_link(flavor.cloud_id, input.project_id)
            .await?
            .ok_or_else(|| {
                AppError::Validation("flavor's cloud is not linked to the project".to_owned())
            })?;
        ensure_membership_usable(&membership)?;
        self.ensure_security_groups(membership.id, &input.security_group_ids)
            .await?;

        let new_instance = NewInstance {
            hostname: NonEmptyString::new(input.hostname)?,
            description: input.description,
            membership_id: membership.id,
            data_volume_size: input.data_volume_size.unwrap_or(flavor.disk),
            flavor,
            template_name: input.template_name,
            agreed_sla: input.agreed_sla,
            security_group_ids: input.security_group_ids,
        };
        new_instance.validate()?;

        let instance = Instance {
            id: Uuid::new_v4(),
            hostname: new_instance.hostname,
            description: new_instance.description,
            membership_id: membership.id,
            project_id: membership.project_id,
            cloud_id: membership.cloud_id,
            flavor_id: new_instance.flavor.id,
            template_name: new_instance.template_name.clone(),
            cores: new_instance.flavor.cores,
            ram: new_instance.flavor.ram,
            system_volume_size: new_instance.flavor.disk,
            data_volume_size: new_instance.data_volume_size,
            agreed_sla: new_instance.agreed_sla,
            security_group_ids: new_instance.security_group_ids,
            state: InstanceState::Provisioning,
            start_time: None,
            created_at: Utc::now(),
        };

        let task = NewTask::new(TaskName::ProvisionInstance, instance.id).with_payload(json!({
            "flavor_id": instance.flavor_id,
            "template_name": instance.template_name,
            "ssh_key_id": input.ssh_key_id,
        }));
        self.repository.create_instance(instance.clone(), task).await?;

        info!(
            instance_id = %instance.id,
            membership_id = %instance.membership_id,
            "instance provisioning scheduled"
        );

        self.audit_repository
            .record(AuditEvent {
                subject: actor.user_id().to_string(),
                action: AuditAction::InstanceCreated,
                resource_type: "instance".to_owned(),
                resource_id: instance.id,
                detail: Some(format!("created instance '{}'", instance.hostname)),
            })
            .await;

        Ok(instance)
    }

    /// Edits hostname, description or security groups.
    ///
    /// Changing security groups schedules pushing them to the backend.
    pub async fn update_instance(
        &self,
        actor: &UserIdentity,
        instance_id: Uuid,
        input: UpdateInstanceInput,
    ) -> AppResult<Instance> {
        let instance = self.get_instance(actor, instance_id).await?;
        self.authorization_service
            .require_project_administrator(actor, instance.project_id)
            .await?;

        let membership = self
            .cloud_repository
            .find_membership(instance.membership_id)
            .await?
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "instance '{instance_id}' references a missing membership"
                ))
            })?;
        ensure_membership_usable(&membership)?;

        let security_groups_changed = match &input.security_group_ids {
            Some(ids) => {
                self.ensure_security_groups(membership.id, ids).await?;
                ids.iter().collect::<BTreeSet<_>>()
                    != instance.security_group_ids.iter().collect::<BTreeSet<_>>()
            }
            None => false,
        };

        let hostname = match input.hostname {
            Some(hostname) => NonEmptyString::new(hostname)?.into(),
            None => String::from(instance.hostname),
        };
        let update = InstanceUpdate {
            id: instance_id,
            hostname,
            description: input.description.or(instance.description),
            security_group_ids: input.security_group_ids,
        };
        let task = security_groups_changed
            .then(|| NewTask::new(TaskName::PushInstanceSecurityGroups, instance_id));

        self.repository.update_instance(update, task).await?;
        self.get_instance(actor, instance_id).await
    }

    async fn ensure_security_groups(
        &self,
        membership_id: Uuid,
        security_group_ids: &[Uuid],
    ) -> AppResult<()> {
        if security_group_ids.is_empty() {
            return Ok(());
        }

        let available: BTreeSet<Uuid> = self
            .cloud_repository
            .list_membership_security_groups(membership_id)
            .await?
            .into_iter()
            .map(|group| group.id)
            .collect();

        match security_group_ids
            .iter()
            .find(|id| !available.contains(id))
        {
            Some(missing) => Err(AppError::Validation(format!(
                "security group '{missing}' does not belong to the instance's cloud project membership"
            ))),
            None => Ok(()),
        }
    }
}

fn ensure_membership_usable(membership: &CloudProjectMembership) -> AppResult<()> {
    if membership.state == SynchronizationState::Erred {
        return Err(AppError::Conflict(
            "Cannot modify an instance if it is connected to a cloud project membership in erred state."
                .to_owned(),
        ));
    }

    Ok(())
}

fn not_allowed_message(operation: InstanceOperation, current: &str) -> String {
    let display = InstanceState::parse(current)
        .map(|state| state.display_name())
        .unwrap_or(current);
    format!(
        "Performing {} operation from instance state '{display}' is not allowed",
        operation.label()
    )
}
