use std::sync::Arc;

use nodeconductor_core::{AppError, AppResult, UserIdentity};
use nodeconductor_domain::{Role, ScopeLevel};
use tracing::warn;
use uuid::Uuid;

use crate::{RoleAssignmentRepository, StructureRepository};

/// Role checks guarding structure and IaaS mutations.
#[derive(Clone)]
pub struct AuthorizationService {
    role_repository: Arc<dyn RoleAssignmentRepository>,
    structure_repository: Arc<dyn StructureRepository>,
}

impl AuthorizationService {
    /// Creates a new authorization service.
    #[must_use]
    pub fn new(
        role_repository: Arc<dyn RoleAssignmentRepository>,
        structure_repository: Arc<dyn StructureRepository>,
    ) -> Self {
        Self {
            role_repository,
            structure_repository,
        }
    }

    /// Requires staff.
    pub fn require_staff(&self, actor: &UserIdentity) -> AppResult<()> {
        if actor.is_staff() {
            Ok(())
        } else {
            Err(forbidden(actor, "staff privileges are required"))
        }
    }

    /// Returns whether the actor is staff or owns the customer.
    pub async fn is_customer_owner(&self, actor: &UserIdentity, customer_id: Uuid) -> AppResult<bool> {
        if actor.is_staff() {
            return Ok(true);
        }

        self.role_repository
            .has_role(actor.user_id(), ScopeLevel::Customer, customer_id, Role::Owner)
            .await
    }

    /// Requires staff or customer ownership.
    pub async fn require_customer_owner(
        &self,
        actor: &UserIdentity,
        customer_id: Uuid,
    ) -> AppResult<()> {
        if self.is_customer_owner(actor, customer_id).await? {
            Ok(())
        } else {
            Err(forbidden(actor, "customer owner role is required"))
        }
    }

    /// Requires staff or the project administrator role.
    pub async fn require_project_administrator(
        &self,
        actor: &UserIdentity,
        project_id: Uuid,
    ) -> AppResult<()> {
        if actor.is_staff()
            || self
                .role_repository
                .has_role(
                    actor.user_id(),
                    ScopeLevel::Project,
                    project_id,
                    Role::Administrator,
                )
                .await?
        {
            Ok(())
        } else {
            Err(forbidden(actor, "project administrator role is required"))
        }
    }

    /// Requires the right to grant or revoke roles on the scope entity.
    ///
    /// Staff may manage every role. Customer owners manage roles of their
    /// customer, its project groups and projects. Project group managers manage
    /// project roles of projects in their groups; project managers manage roles
    /// of their project.
    pub async fn require_role_management(
        &self,
        actor: &UserIdentity,
        level: ScopeLevel,
        scope_id: Uuid,
    ) -> AppResult<()> {
        if self.can_manage_roles(actor, level, scope_id).await? {
            Ok(())
        } else {
            Err(forbidden(actor, "not allowed to manage roles on this scope"))
        }
    }

    async fn can_manage_roles(
        &self,
        actor: &UserIdentity,
        level: ScopeLevel,
        scope_id: Uuid,
    ) -> AppResult<bool> {
        if actor.is_staff() {
            return Ok(true);
        }

        match level {
            ScopeLevel::Customer => self.is_customer_owner(actor, scope_id).await,
            ScopeLevel::ProjectGroup => {
                let project_group = self
                    .structure_repository
                    .find_project_group(scope_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound(format!("project group '{scope_id}' not found"))
                    })?;
                self.is_customer_owner(actor, project_group.customer_id)
                    .await
            }
            ScopeLevel::Project => {
                let project = self
                    .structure_repository
                    .find_project(scope_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("project '{scope_id}' not found")))?;

                if self.is_customer_owner(actor, project.customer_id).await? {
                    return Ok(true);
                }

                for project_group_id in &project.project_group_ids {
                    if self
                        .role_repository
                        .has_role(
                            actor.user_id(),
                            ScopeLevel::ProjectGroup,
                            *project_group_id,
                            Role::Manager,
                        )
                        .await?
                    {
                        return Ok(true);
                    }
                }

                self.role_repository
                    .has_role(actor.user_id(), ScopeLevel::Project, scope_id, Role::Manager)
                    .await
            }
        }
    }
}

fn forbidden(actor: &UserIdentity, message: &str) -> AppError {
    warn!(user_id = %actor.user_id(), reason = message, "authorization denied");
    AppError::Forbidden(message.to_owned())
}
