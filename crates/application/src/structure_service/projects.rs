use chrono::Utc;

use super::*;

impl StructureService {
    /// Lists project groups visible to the caller.
    pub async fn list_project_groups(
        &self,
        actor: &UserIdentity,
        query: &StructureListQuery,
    ) -> AppResult<Vec<ProjectGroup>> {
        let visible = self
            .scope_filter
            .visible_ids(actor, EntityKind::ProjectGroup)
            .await?;
        self.repository.list_project_groups(&visible, query).await
    }

    /// Returns one visible project group.
    pub async fn get_project_group(
        &self,
        actor: &UserIdentity,
        project_group_id: Uuid,
    ) -> AppResult<ProjectGroup> {
        self.scope_filter
            .require_visible(actor, EntityKind::ProjectGroup, project_group_id)
            .await?;
        self.repository
            .find_project_group(project_group_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("project group '{project_group_id}' not found"))
            })
    }

    /// Creates a project group. Staff or customer owner.
    pub async fn create_project_group(
        &self,
        actor: &UserIdentity,
        input: CreateProjectGroupInput,
    ) -> AppResult<ProjectGroup> {
        self.get_customer(actor, input.customer_id).await?;
        self.authorization_service
            .require_customer_owner(actor, input.customer_id)
            .await?;

        let project_group = ProjectGroup {
            id: Uuid::new_v4(),
            customer_id: input.customer_id,
            name: NonEmptyString::new(input.name)?,
            created_at: Utc::now(),
        };
        self.repository
            .create_project_group(project_group.clone())
            .await?;

        self.audit(
            actor,
            AuditAction::ProjectGroupCreated,
            "project_group",
            project_group.id,
            format!("created project group '{}'", project_group.name),
        )
        .await;

        Ok(project_group)
    }

    /// Deletes a project group. Staff or customer owner.
    pub async fn delete_project_group(
        &self,
        actor: &UserIdentity,
        project_group_id: Uuid,
    ) -> AppResult<()> {
        let project_group = self.get_project_group(actor, project_group_id).await?;
        self.authorization_service
            .require_customer_owner(actor, project_group.customer_id)
            .await?;
        self.repository.delete_project_group(project_group_id).await
    }

    /// Lists projects visible to the caller.
    pub async fn list_projects(
        &self,
        actor: &UserIdentity,
        query: &StructureListQuery,
    ) -> AppResult<Vec<Project>> {
        let visible = self
            .scope_filter
            .visible_ids(actor, EntityKind::Project)
            .await?;
        self.repository.list_projects(&visible, query).await
    }

    /// Returns one visible project.
    pub async fn get_project(&self, actor: &UserIdentity, project_id: Uuid) -> AppResult<Project> {
        self.scope_filter
            .require_visible(actor, EntityKind::Project, project_id)
            .await?;
        self.repository
            .find_project(project_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("project '{project_id}' not found")))
    }

    /// Creates a project, optionally inside a group of the same customer.
    pub async fn create_project(
        &self,
        actor: &UserIdentity,
        input: CreateProjectInput,
    ) -> AppResult<Project> {
        self.get_customer(actor, input.customer_id).await?;
        self.authorization_service
            .require_customer_owner(actor, input.customer_id)
            .await?;

        let mut project_group_ids = Vec::new();
        if let Some(project_group_id) = input.project_group_id {
            let project_group = self.get_project_group(actor, project_group_id).await?;
            if project_group.customer_id != input.customer_id {
                return Err(AppError::Validation(
                    "project group belongs to another customer".to_owned(),
                ));
            }
            project_group_ids.push(project_group_id);
        }

        let project = Project {
            id: Uuid::new_v4(),
            customer_id: input.customer_id,
            name: NonEmptyString::new(input.name)?,
            description: input.description,
            project_group_ids,
            created_at: Utc::now(),
        };
        self.repository.create_project(project.clone()).await?;

        self.audit(
            actor,
            AuditAction::ProjectCreated,
            "project",
            project.id,
            format!("created project '{}'", project.name),
        )
        .await;

        Ok(project)
    }

    /// Deletes a project. Staff or customer owner.
    pub async fn delete_project(&self, actor: &UserIdentity, project_id: Uuid) -> AppResult<()> {
        let project = self.get_project(actor, project_id).await?;
        self.authorization_service
            .require_customer_owner(actor, project.customer_id)
            .await?;
        self.repository.delete_project(project_id).await
    }

    /// Adds a project to a group of the same customer.
    pub async fn add_project_to_group(
        &self,
        actor: &UserIdentity,
        project_id: Uuid,
        project_group_id: Uuid,
    ) -> AppResult<Project> {
        let customer_id = self
            .require_group_link_rights(actor, project_id, project_group_id)
            .await?;
        self.repository
            .add_project_to_group(project_id, project_group_id)
            .await?;
        tracing::info!(%project_id, %project_group_id, %customer_id, "project added to group");
        self.get_project(actor, project_id).await
    }

    /// Removes a project from a group.
    pub async fn remove_project_from_group(
        &self,
        actor: &UserIdentity,
        project_id: Uuid,
        project_group_id: Uuid,
    ) -> AppResult<Project> {
        self.require_group_link_rights(actor, project_id, project_group_id)
            .await?;
        self.repository
            .remove_project_from_group(project_id, project_group_id)
            .await?;
        self.get_project(actor, project_id).await
    }

    async fn require_group_link_rights(
        &self,
        actor: &UserIdentity,
        project_id: Uuid,
        project_group_id: Uuid,
    ) -> AppResult<Uuid> {
        let project = self.get_project(actor, project_id).await?;
        let project_group = self.get_project_group(actor, project_group_id).await?;
        if project.customer_id != project_group.customer_id {
            return Err(AppError::Validation(
                "project and project group belong to different customers".to_owned(),
            ));
        }

        self.authorization_service
            .require_customer_owner(actor, project.customer_id)
            .await?;
        Ok(project.customer_id)
    }
}
