use nodeconductor_core::UserId;

use super::*;

impl StructureService {
    /// Lists role assignments of `level` whose scope entity is visible.
    pub async fn list_role_assignments(
        &self,
        actor: &UserIdentity,
        level: ScopeLevel,
        user_id: Option<UserId>,
    ) -> AppResult<Vec<RoleAssignment>> {
        let visible = self
            .scope_filter
            .visible_ids(actor, EntityKind::from(level))
            .await?;
        self.role_repository
            .list_role_assignments(level, &visible, user_id)
            .await
    }

    /// Grants a role. Granting an existing role is reported, not repeated.
    pub async fn grant_role(&self, actor: &UserIdentity, input: GrantRoleInput) -> AppResult<RoleGrant> {
        let assignment = RoleAssignment::new(input.user_id, input.level, input.scope_id, input.role)?;

        if self
            .user_repository
            .find_by_id(input.user_id)
            .await?
            .is_none()
        {
            return Err(AppError::Validation(format!(
                "user '{}' does not exist",
                input.user_id
            )));
        }

        self.scope_filter
            .require_visible(actor, EntityKind::from(input.level), input.scope_id)
            .await?;
        self.authorization_service
            .require_role_management(actor, input.level, input.scope_id)
            .await?;

        let grant = self.role_repository.grant_role(assignment).await?;
        if let RoleGrant::Created(created) = &grant {
            self.audit(
                actor,
                AuditAction::RoleGranted,
                created.level.as_str(),
                created.scope_id,
                format!(
                    "granted role '{}' to user {}",
                    created.role.as_str(),
                    created.user_id
                ),
            )
            .await;
        }

        Ok(grant)
    }

    /// Revokes a role assignment.
    pub async fn revoke_role(&self, actor: &UserIdentity, assignment_id: Uuid) -> AppResult<()> {
        let assignment = self
            .role_repository
            .find_role_assignment(assignment_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("role assignment '{assignment_id}' not found"))
            })?;

        self.scope_filter
            .require_visible(actor, EntityKind::from(assignment.level), assignment.scope_id)
            .await?;
        self.authorization_service
            .require_role_management(actor, assignment.level, assignment.scope_id)
            .await?;

        self.role_repository.revoke_role(assignment_id).await?;
        self.audit(
            actor,
            AuditAction::RoleRevoked,
            assignment.level.as_str(),
            assignment.scope_id,
            format!(
                "revoked role '{}' from user {}",
                assignment.role.as_str(),
                assignment.user_id
            ),
        )
        .await;

        Ok(())
    }
}
