use std::sync::Arc;

use chrono::Utc;
use nodeconductor_core::{AppError, AppResult, UserIdentity};
use nodeconductor_domain::{
    AuditAction, Cloud, CloudProjectMembership, EntityKind, Flavor, SecurityGroup,
    SecurityGroupTemplate, SynchronizationState, TaskName,
};
use tracing::info;
use uuid::Uuid;

use crate::{
    AuditEvent, AuditRepository, AuthorizationService, CloudListQuery, CloudRepository, NewTask,
    ScopeFilterService, SecurityGroupListQuery, StructureRepository,
};

/// Input payload for cloud account registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCloudInput {
    /// Owning customer.
    pub customer_id: Uuid,
    /// Display name.
    pub name: String,
    /// Identity endpoint of the backend.
    pub auth_url: String,
}

/// Application service for cloud accounts, flavors, memberships and
/// security groups.
#[derive(Clone)]
pub struct CloudService {
    scope_filter: ScopeFilterService,
    authorization_service: AuthorizationService,
    repository: Arc<dyn CloudRepository>,
    structure_repository: Arc<dyn StructureRepository>,
    audit_repository: Arc<dyn AuditRepository>,
    default_security_groups: Arc<[SecurityGroupTemplate]>,
}

impl CloudService {
    /// Creates a new cloud service.
    #[must_use]
    pub fn new(
        scope_filter: ScopeFilterService,
        authorization_service: AuthorizationService,
        repository: Arc<dyn CloudRepository>,
        structure_repository: Arc<dyn StructureRepository>,
        audit_repository: Arc<dyn AuditRepository>,
        default_security_groups: Vec<SecurityGroupTemplate>,
    ) -> Self {
        Self {
            scope_filter,
            authorization_service,
            repository,
            structure_repository,
            audit_repository,
            default_security_groups: default_security_groups.into(),
        }
    }

    /// Lists visible clouds.
    pub async fn list_clouds(
        &self,
        actor: &UserIdentity,
        query: &CloudListQuery,
    ) -> AppResult<Vec<Cloud>> {
        let visible = self.scope_filter.visible_ids(actor, EntityKind::Cloud).await?;
        self.repository.list_clouds(&visible, query).await
    }

    /// Returns one visible cloud.
    pub async fn get_cloud(&self, actor: &UserIdentity, cloud_id: Uuid) -> AppResult<Cloud> {
        self.scope_filter
            .require_visible(actor, EntityKind::Cloud, cloud_id)
            .await?;
        self.repository
            .find_cloud(cloud_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("cloud '{cloud_id}' not found")))
    }

    /// Registers a cloud account and schedules its first synchronization.
    pub async fn create_cloud(
        &self,
        actor: &UserIdentity,
        input: CreateCloudInput,
    ) -> AppResult<Cloud> {
        self.scope_filter
            .require_visible(actor, EntityKind::Customer, input.customer_id)
            .await?;
        self.authorization_service
            .require_customer_owner(actor, input.customer_id)
            .await?;

        let cloud = Cloud::new(input.customer_id, &input.name, &input.auth_url)?;
        self.repository
            .create_cloud(
                cloud.clone(),
                NewTask::new(TaskName::SyncCloudAccount, cloud.id),
            )
            .await?;

        self.audit_repository
            .record(AuditEvent {
                subject: actor.user_id().to_string(),
                action: AuditAction::CloudCreated,
                resource_type: "cloud".to_owned(),
                resource_id: cloud.id,
                detail: Some(format!("registered cloud '{}'", cloud.name)),
            })
            .await;

        Ok(cloud)
    }

    /// Lists visible flavors, optionally of one cloud.
    pub async fn list_flavors(
        &self,
        actor: &UserIdentity,
        cloud_id: Option<Uuid>,
    ) -> AppResult<Vec<Flavor>> {
        let visible = self
            .scope_filter
            .visible_ids(actor, EntityKind::Flavor)
            .await?;
        self.repository.list_flavors(&visible, cloud_id).await
    }

    /// Lists visible cloud-project memberships.
    pub async fn list_memberships(
        &self,
        actor: &UserIdentity,
    ) -> AppResult<Vec<CloudProjectMembership>> {
        let visible = self
            .scope_filter
            .visible_ids(actor, EntityKind::CloudProjectMembership)
            .await?;
        self.repository.list_memberships(&visible).await
    }

    /// Returns one visible membership.
    pub async fn get_membership(
        &self,
        actor: &UserIdentity,
        membership_id: Uuid,
    ) -> AppResult<CloudProjectMembership> {
        self.scope_filter
            .require_visible(actor, EntityKind::CloudProjectMembership, membership_id)
            .await?;
        self.repository
            .find_membership(membership_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("membership '{membership_id}' not found"))
            })
    }

    /// Links a cloud to a project of the same customer.
    ///
    /// The configured default security groups are created with the link and
    /// the tenant synchronization is scheduled in the same transaction.
    pub async fn create_membership(
        &self,
        actor: &UserIdentity,
        cloud_id: Uuid,
        project_id: Uuid,
    ) -> AppResult<CloudProjectMembership> {
        let cloud = self.get_cloud(actor, cloud_id).await?;
        self.scope_filter
            .require_visible(actor, EntityKind::Project, project_id)
            .await?;
        let project = self
            .structure_repository
            .find_project(project_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("project '{project_id}' not found")))?;

        if cloud.customer_id != project.customer_id {
            return Err(AppError::Validation(
                "cloud and project must belong to the same customer".to_owned(),
            ));
        }
        self.authorization_service
            .require_customer_owner(actor, project.customer_id)
            .await?;

        let membership = CloudProjectMembership {
            id: Uuid::new_v4(),
            cloud_id,
            project_id,
            tenant_id: None,
            state: SynchronizationState::New,
            created_at: Utc::now(),
        };
        let security_groups: Vec<SecurityGroup> = self
            .default_security_groups
            .iter()
            .map(|template| template.instantiate(membership.id))
            .collect();
        let group_count = security_groups.len();

        self.repository
            .create_membership(
                membership.clone(),
                security_groups,
                NewTask::new(TaskName::SyncCloudMembership, membership.id),
            )
            .await?;

        info!(
            membership_id = %membership.id,
            %cloud_id,
            %project_id,
            security_groups = group_count,
            "cloud linked to project"
        );

        self.audit_repository
            .record(AuditEvent {
                subject: actor.user_id().to_string(),
                action: AuditAction::MembershipCreated,
                resource_type: "cloud_project_membership".to_owned(),
                resource_id: membership.id,
                detail: None,
            })
            .await;

        Ok(membership)
    }

    /// Lists visible security groups.
    pub async fn list_security_groups(
        &self,
        actor: &UserIdentity,
        query: &SecurityGroupListQuery,
    ) -> AppResult<Vec<SecurityGroup>> {
        let visible = self
            .scope_filter
            .visible_ids(actor, EntityKind::SecurityGroup)
            .await?;
        self.repository.list_security_groups(&visible, query).await
    }
}
