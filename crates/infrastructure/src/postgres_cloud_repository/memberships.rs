use super::*;

impl PostgresCloudRepository {
    pub(super) async fn list_memberships_impl(
        &self,
        visible: &VisibleIds,
    ) -> AppResult<Vec<CloudProjectMembership>> {
        let rows = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT id, cloud_id, project_id, tenant_id, state, created_at
            FROM cloud_project_memberships
            WHERE ($1::UUID[] IS NULL OR id = ANY($1))
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(visible.to_bind())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list cloud project memberships: {error}"))
        })?;

        rows.into_iter()
            .map(CloudProjectMembership::try_from)
            .collect()
    }

    pub(super) async fn find_membership_impl(
        &self,
        membership_id: Uuid,
    ) -> AppResult<Option<CloudProjectMembership>> {
        let row = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT id, cloud_id, project_id, tenant_id, state, created_at
            FROM cloud_project_memberships
            WHERE id = $1
            "#,
        )
        .bind(membership_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find cloud project membership '{membership_id}': {error}"
            ))
        })?;

        row.map(CloudProjectMembership::try_from).transpose()
    }

    pub(super) async fn find_membership_by_link_impl(
        &self,
        cloud_id: Uuid,
        project_id: Uuid,
    ) -> AppResult<Option<CloudProjectMembership>> {
        let row = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT id, cloud_id, project_id, tenant_id, state, created_at
            FROM cloud_project_memberships
            WHERE cloud_id = $1 AND project_id = $2
            "#,
        )
        .bind(cloud_id)
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find membership of cloud '{cloud_id}' in project '{project_id}': {error}"
            ))
        })?;

        row.map(CloudProjectMembership::try_from).transpose()
    }

    pub(super) async fn create_membership_impl(
        &self,
        membership: CloudProjectMembership,
        security_groups: Vec<SecurityGroup>,
        task: NewTask,
    ) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to start membership create transaction: {error}"
            ))
        })?;

        sqlx::query(
            r#"
            INSERT INTO cloud_project_memberships (id, cloud_id, project_id, tenant_id, state, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(membership.id)
        .bind(membership.cloud_id)
        .bind(membership.project_id)
        .bind(membership.tenant_id.as_deref())
        .bind(membership.state.as_str())
        .bind(membership.created_at)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            unique_conflict_or_internal(
                error,
                "cloud is already linked to the project",
                "create cloud project membership",
            )
        })?;

        for group in &security_groups {
            let rules = serde_json::to_value(&group.rules).map_err(|error| {
                AppError::Internal(format!(
                    "failed to serialize rules of security group '{}': {error}",
                    group.name
                ))
            })?;

            sqlx::query(
                r#"
                INSERT INTO security_groups (id, membership_id, name, description, rules)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(group.id)
            .bind(membership.id)
            .bind(group.name.as_str())
            .bind(group.description.as_deref())
            .bind(rules)
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to create security group '{}': {error}",
                    group.name
                ))
            })?;
        }

        insert_task(&mut *transaction, &task).await?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to commit membership create transaction: {error}"
            ))
        })?;

        Ok(())
    }

    pub(super) async fn set_membership_state_impl(
        &self,
        membership_id: Uuid,
        state: SynchronizationState,
        tenant_id: Option<String>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE cloud_project_memberships
            SET state = $2, tenant_id = COALESCE($3, tenant_id)
            WHERE id = $1
            "#,
        )
        .bind(membership_id)
        .bind(state.as_str())
        .bind(tenant_id)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to update state of membership '{membership_id}': {error}"
            ))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "cloud project membership '{membership_id}' not found"
            )));
        }

        Ok(())
    }

    pub(super) async fn list_security_groups_impl(
        &self,
        visible: &VisibleIds,
        query: &SecurityGroupListQuery,
    ) -> AppResult<Vec<SecurityGroup>> {
        let rows = sqlx::query_as::<_, SecurityGroupRow>(
            r#"
            SELECT groups.id, groups.membership_id, groups.name, groups.description, groups.rules
            FROM security_groups groups
            INNER JOIN cloud_project_memberships memberships
                ON memberships.id = groups.membership_id
            WHERE ($1::UUID[] IS NULL OR groups.id = ANY($1))
              AND ($2::UUID IS NULL OR memberships.cloud_id = $2)
              AND ($3::UUID IS NULL OR memberships.project_id = $3)
            ORDER BY groups.name ASC, groups.id ASC
            "#,
        )
        .bind(visible.to_bind())
        .bind(query.cloud_id)
        .bind(query.project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list security groups: {error}")))?;

        rows.into_iter().map(SecurityGroup::try_from).collect()
    }

    pub(super) async fn list_membership_security_groups_impl(
        &self,
        membership_id: Uuid,
    ) -> AppResult<Vec<SecurityGroup>> {
        let rows = sqlx::query_as::<_, SecurityGroupRow>(
            r#"
            SELECT id, membership_id, name, description, rules
            FROM security_groups
            WHERE membership_id = $1
            ORDER BY name ASC
            "#,
        )
        .bind(membership_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list security groups of membership '{membership_id}': {error}"
            ))
        })?;

        rows.into_iter().map(SecurityGroup::try_from).collect()
    }
}
