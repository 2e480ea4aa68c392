use super::*;

impl PostgresStructureRepository {
    pub(super) async fn list_role_assignments_impl(
        &self,
        level: ScopeLevel,
        visible_scopes: &VisibleIds,
        user_id: Option<UserId>,
    ) -> AppResult<Vec<RoleAssignment>> {
        let rows = sqlx::query_as::<_, RoleAssignmentRow>(
            r#"
            SELECT id, user_id, level, scope_id, role
            FROM role_assignments
            WHERE level = $1
              AND ($2::UUID[] IS NULL OR scope_id = ANY($2))
              AND ($3::UUID IS NULL OR user_id = $3)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(level.as_str())
        .bind(visible_scopes.to_bind())
        .bind(user_id.map(|user_id| user_id.as_uuid()))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list {} role assignments: {error}",
                level.as_str()
            ))
        })?;

        rows.into_iter().map(RoleAssignment::try_from).collect()
    }

    pub(super) async fn find_role_assignment_impl(
        &self,
        assignment_id: Uuid,
    ) -> AppResult<Option<RoleAssignment>> {
        let row = sqlx::query_as::<_, RoleAssignmentRow>(
            "SELECT id, user_id, level, scope_id, role FROM role_assignments WHERE id = $1",
        )
        .bind(assignment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find role assignment '{assignment_id}': {error}"
            ))
        })?;

        row.map(RoleAssignment::try_from).transpose()
    }

    pub(super) async fn has_role_impl(
        &self,
        user_id: UserId,
        level: ScopeLevel,
        scope_id: Uuid,
        role: Role,
    ) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM role_assignments
                WHERE user_id = $1 AND level = $2 AND scope_id = $3 AND role = $4
            )
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(level.as_str())
        .bind(scope_id)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to check role of user '{user_id}' on {} '{scope_id}': {error}",
                level.as_str()
            ))
        })
    }

    pub(super) async fn grant_role_impl(&self, assignment: RoleAssignment) -> AppResult<RoleGrant> {
        let inserted = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO role_assignments (id, user_id, level, scope_id, role)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, level, scope_id, role) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(assignment.id)
        .bind(assignment.user_id.as_uuid())
        .bind(assignment.level.as_str())
        .bind(assignment.scope_id)
        .bind(assignment.role.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            reference_conflict_or_internal(error, "user does not exist", "grant role")
        })?;

        if inserted.is_some() {
            return Ok(RoleGrant::Created(assignment));
        }

        let existing = sqlx::query_as::<_, RoleAssignmentRow>(
            r#"
            SELECT id, user_id, level, scope_id, role
            FROM role_assignments
            WHERE user_id = $1 AND level = $2 AND scope_id = $3 AND role = $4
            "#,
        )
        .bind(assignment.user_id.as_uuid())
        .bind(assignment.level.as_str())
        .bind(assignment.scope_id)
        .bind(assignment.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to load existing role assignment: {error}"))
        })?;

        Ok(RoleGrant::AlreadyGranted(RoleAssignment::try_from(existing)?))
    }

    pub(super) async fn revoke_role_impl(&self, assignment_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM role_assignments WHERE id = $1")
            .bind(assignment_id)
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to revoke role assignment '{assignment_id}': {error}"
                ))
            })?;

        Ok(())
    }
}
