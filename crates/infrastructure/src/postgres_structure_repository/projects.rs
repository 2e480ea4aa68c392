use super::*;

const PROJECT_COLUMNS: &str = r#"
    SELECT
        projects.id,
        projects.customer_id,
        projects.name,
        projects.description,
        COALESCE(
            array_agg(links.project_group_id) FILTER (WHERE links.project_group_id IS NOT NULL),
            '{}'
        ) AS project_group_ids,
        projects.created_at
    FROM projects
    LEFT JOIN project_group_projects links ON links.project_id = projects.id
"#;

impl PostgresStructureRepository {
    pub(super) async fn list_project_groups_impl(
        &self,
        visible: &VisibleIds,
        query: &StructureListQuery,
    ) -> AppResult<Vec<ProjectGroup>> {
        let rows = sqlx::query_as::<_, ProjectGroupRow>(
            r#"
            SELECT id, customer_id, name, created_at
            FROM project_groups
            WHERE ($1::UUID[] IS NULL OR id = ANY($1))
              AND ($2::TEXT IS NULL OR name ILIKE '%' || $2 || '%')
              AND ($3::UUID IS NULL OR customer_id = $3)
            ORDER BY name ASC, id ASC
            "#,
        )
        .bind(visible.to_bind())
        .bind(query.name.as_deref())
        .bind(query.customer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list project groups: {error}")))?;

        rows.into_iter().map(ProjectGroup::try_from).collect()
    }

    pub(super) async fn find_project_group_impl(
        &self,
        project_group_id: Uuid,
    ) -> AppResult<Option<ProjectGroup>> {
        let row = sqlx::query_as::<_, ProjectGroupRow>(
            "SELECT id, customer_id, name, created_at FROM project_groups WHERE id = $1",
        )
        .bind(project_group_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find project group '{project_group_id}': {error}"
            ))
        })?;

        row.map(ProjectGroup::try_from).transpose()
    }

    pub(super) async fn create_project_group_impl(
        &self,
        project_group: ProjectGroup,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO project_groups (id, customer_id, name, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(project_group.id)
        .bind(project_group.customer_id)
        .bind(project_group.name.as_str())
        .bind(project_group.created_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            reference_conflict_or_internal(
                error,
                "customer of the project group does not exist",
                "create project group",
            )
        })?;

        Ok(())
    }

    pub(super) async fn delete_project_group_impl(&self, project_group_id: Uuid) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to start project group delete transaction: {error}"
            ))
        })?;

        sqlx::query("DELETE FROM role_assignments WHERE level = 'project_group' AND scope_id = $1")
            .bind(project_group_id)
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to delete role assignments of project group '{project_group_id}': {error}"
                ))
            })?;

        sqlx::query("DELETE FROM project_groups WHERE id = $1")
            .bind(project_group_id)
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to delete project group '{project_group_id}': {error}"
                ))
            })?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to commit project group delete transaction: {error}"
            ))
        })?;

        Ok(())
    }

    pub(super) async fn list_projects_impl(
        &self,
        visible: &VisibleIds,
        query: &StructureListQuery,
    ) -> AppResult<Vec<Project>> {
        let statement = format!(
            r#"
            {PROJECT_COLUMNS}
            WHERE ($1::UUID[] IS NULL OR projects.id = ANY($1))
              AND ($2::TEXT IS NULL OR projects.name ILIKE '%' || $2 || '%')
              AND ($3::UUID IS NULL OR projects.customer_id = $3)
            GROUP BY projects.id
            ORDER BY projects.name ASC, projects.id ASC
            "#
        );

        let rows = sqlx::query_as::<_, ProjectRow>(statement.as_str())
            .bind(visible.to_bind())
            .bind(query.name.as_deref())
            .bind(query.customer_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to list projects: {error}")))?;

        rows.into_iter().map(Project::try_from).collect()
    }

    pub(super) async fn find_project_impl(&self, project_id: Uuid) -> AppResult<Option<Project>> {
        let statement = format!("{PROJECT_COLUMNS} WHERE projects.id = $1 GROUP BY projects.id");

        let row = sqlx::query_as::<_, ProjectRow>(statement.as_str())
            .bind(project_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to find project '{project_id}': {error}"))
            })?;

        row.map(Project::try_from).transpose()
    }

    pub(super) async fn create_project_impl(&self, project: Project) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to start project create transaction: {error}"))
        })?;

        sqlx::query(
            r#"
            INSERT INTO projects (id, customer_id, name, description, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(project.id)
        .bind(project.customer_id)
        .bind(project.name.as_str())
        .bind(project.description.as_deref())
        .bind(project.created_at)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            reference_conflict_or_internal(
                error,
                "customer of the project does not exist",
                "create project",
            )
        })?;

        sqlx::query(
            r#"
            INSERT INTO project_group_projects (project_group_id, project_id)
            SELECT group_id, $2
            FROM UNNEST($1::UUID[]) AS group_id
            "#,
        )
        .bind(&project.project_group_ids)
        .bind(project.id)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            reference_conflict_or_internal(
                error,
                "project group does not exist",
                "link project to its groups",
            )
        })?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit project create transaction: {error}"))
        })?;

        Ok(())
    }

    pub(super) async fn delete_project_impl(&self, project_id: Uuid) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to start project delete transaction: {error}"))
        })?;

        sqlx::query("DELETE FROM role_assignments WHERE level = 'project' AND scope_id = $1")
            .bind(project_id)
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to delete role assignments of project '{project_id}': {error}"
                ))
            })?;

        sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(project_id)
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                reference_conflict_or_internal(
                    error,
                    "project still has instances",
                    "delete project",
                )
            })?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit project delete transaction: {error}"))
        })?;

        Ok(())
    }

    pub(super) async fn add_project_to_group_impl(
        &self,
        project_id: Uuid,
        project_group_id: Uuid,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO project_group_projects (project_group_id, project_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(project_group_id)
        .bind(project_id)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            reference_conflict_or_internal(
                error,
                "project or project group does not exist",
                "add project to group",
            )
        })?;

        Ok(())
    }

    pub(super) async fn remove_project_from_group_impl(
        &self,
        project_id: Uuid,
        project_group_id: Uuid,
    ) -> AppResult<()> {
        sqlx::query(
            "DELETE FROM project_group_projects WHERE project_group_id = $1 AND project_id = $2",
        )
        .bind(project_group_id)
        .bind(project_id)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to remove project '{project_id}' from group '{project_group_id}': {error}"
            ))
        })?;

        Ok(())
    }
}
