use std::collections::BTreeSet;

use async_trait::async_trait;
use nodeconductor_application::{
    RoleAssignmentRepository, RoleGrant, RoleScopeRepository, StructureListQuery,
    StructureRepository, UserRecord, UserRepository,
};
use nodeconductor_core::{AppError, AppResult, NonEmptyString, UserId};
use nodeconductor_domain::{
    Customer, EntityKind, Project, ProjectGroup, Role, RoleAssignment, RoleScope, ScopeLevel,
    VisibleIds,
};
use uuid::Uuid;

use super::InMemoryRepository;

pub(super) fn name_contains(name: &NonEmptyString, fragment: Option<&String>) -> bool {
    fragment.is_none_or(|fragment| {
        name.as_str()
            .to_lowercase()
            .contains(fragment.to_lowercase().as_str())
    })
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn find_by_username(&self, username: &str) -> AppResult<Option<UserRecord>> {
        Ok(self
            .state
            .read()
            .await
            .users
            .iter()
            .find(|user| user.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<UserRecord>> {
        Ok(self
            .state
            .read()
            .await
            .users
            .iter()
            .find(|user| user.id == user_id)
            .cloned())
    }

    async fn create(&self, user: UserRecord) -> AppResult<()> {
        let mut state = self.state.write().await;
        if state
            .users
            .iter()
            .any(|stored| stored.username.eq_ignore_ascii_case(user.username.as_str()))
        {
            return Err(AppError::Conflict(format!(
                "username '{}' is already taken",
                user.username
            )));
        }

        state.users.push(user);
        Ok(())
    }
}

#[async_trait]
impl RoleScopeRepository for InMemoryRepository {
    async fn resolve_scope(&self, user_id: UserId) -> AppResult<RoleScope> {
        Ok(RoleScope::from_assignments(
            self.state
                .read()
                .await
                .roles
                .iter()
                .filter(|assignment| assignment.user_id == user_id),
        ))
    }

    async fn ids_within_scope(
        &self,
        kind: EntityKind,
        scope: &RoleScope,
    ) -> AppResult<BTreeSet<Uuid>> {
        Ok(self.state.read().await.ids_within(kind, scope))
    }
}

#[async_trait]
impl StructureRepository for InMemoryRepository {
    async fn list_customers(
        &self,
        visible: &VisibleIds,
        query: &StructureListQuery,
    ) -> AppResult<Vec<Customer>> {
        Ok(self
            .state
            .read()
            .await
            .customers
            .values()
            .filter(|customer| visible.contains(&customer.id))
            .filter(|customer| name_contains(&customer.name, query.name.as_ref()))
            .cloned()
            .collect())
    }

    async fn find_customer(&self, customer_id: Uuid) -> AppResult<Option<Customer>> {
        Ok(self.state.read().await.customers.get(&customer_id).cloned())
    }

    async fn save_customer(&self, customer: Customer) -> AppResult<()> {
        self.state
            .write()
            .await
            .customers
            .insert(customer.id, customer);
        Ok(())
    }

    async fn delete_customer(&self, customer_id: Uuid) -> AppResult<()> {
        let mut state = self.state.write().await;
        if state
            .projects
            .values()
            .any(|project| project.customer_id == customer_id)
        {
            return Err(AppError::Conflict(
                "customer still owns projects".to_owned(),
            ));
        }
        if state.customers.remove(&customer_id).is_none() {
            return Err(AppError::NotFound(format!(
                "customer '{customer_id}' not found"
            )));
        }

        let groups: BTreeSet<Uuid> = state
            .project_groups
            .values()
            .filter(|group| group.customer_id == customer_id)
            .map(|group| group.id)
            .collect();
        state.project_groups.retain(|id, _| !groups.contains(id));
        state.clouds.retain(|_, cloud| cloud.customer_id != customer_id);
        state.roles.retain(|assignment| {
            !(assignment.level == ScopeLevel::Customer && assignment.scope_id == customer_id)
                && !(assignment.level == ScopeLevel::ProjectGroup
                    && groups.contains(&assignment.scope_id))
        });
        Ok(())
    }

    async fn list_project_groups(
        &self,
        visible: &VisibleIds,
        query: &StructureListQuery,
    ) -> AppResult<Vec<ProjectGroup>> {
        Ok(self
            .state
            .read()
            .await
            .project_groups
            .values()
            .filter(|group| visible.contains(&group.id))
            .filter(|group| name_contains(&group.name, query.name.as_ref()))
            .filter(|group| query.customer_id.is_none_or(|id| id == group.customer_id))
            .cloned()
            .collect())
    }

    async fn find_project_group(
        &self,
        project_group_id: Uuid,
    ) -> AppResult<Option<ProjectGroup>> {
        Ok(self
            .state
            .read()
            .await
            .project_groups
            .get(&project_group_id)
            .cloned())
    }

    async fn create_project_group(&self, project_group: ProjectGroup) -> AppResult<()> {
        let mut state = self.state.write().await;
        if !state.customers.contains_key(&project_group.customer_id) {
            return Err(AppError::Conflict(
                "customer of the project group does not exist".to_owned(),
            ));
        }

        state.project_groups.insert(project_group.id, project_group);
        Ok(())
    }

    async fn delete_project_group(&self, project_group_id: Uuid) -> AppResult<()> {
        let mut state = self.state.write().await;
        if state.project_groups.remove(&project_group_id).is_none() {
            return Err(AppError::NotFound(format!(
                "project group '{project_group_id}' not found"
            )));
        }

        for project in state.projects.values_mut() {
            project.project_group_ids.retain(|id| *id != project_group_id);
        }
        state.roles.retain(|assignment| {
            !(assignment.level == ScopeLevel::ProjectGroup
                && assignment.scope_id == project_group_id)
        });
        Ok(())
    }

    async fn list_projects(
        &self,
        visible: &VisibleIds,
        query: &StructureListQuery,
    ) -> AppResult<Vec<Project>> {
        Ok(self
            .state
            .read()
            .await
            .projects
            .values()
            .filter(|project| visible.contains(&project.id))
            .filter(|project| name_contains(&project.name, query.name.as_ref()))
            .filter(|project| query.customer_id.is_none_or(|id| id == project.customer_id))
            .cloned()
            .collect())
    }

    async fn find_project(&self, project_id: Uuid) -> AppResult<Option<Project>> {
        Ok(self.state.read().await.projects.get(&project_id).cloned())
    }

    async fn create_project(&self, project: Project) -> AppResult<()> {
        let mut state = self.state.write().await;
        if !state.customers.contains_key(&project.customer_id) {
            return Err(AppError::Conflict(
                "customer of the project does not exist".to_owned(),
            ));
        }

        state.projects.insert(project.id, project);
        Ok(())
    }

    async fn delete_project(&self, project_id: Uuid) -> AppResult<()> {
        let mut state = self.state.write().await;
        let memberships: BTreeSet<Uuid> = state
            .memberships
            .values()
            .filter(|membership| membership.project_id == project_id)
            .map(|membership| membership.id)
            .collect();
        if state
            .instances
            .values()
            .any(|instance| memberships.contains(&instance.membership_id))
        {
            return Err(AppError::Conflict("project still has instances".to_owned()));
        }
        if state.projects.remove(&project_id).is_none() {
            return Err(AppError::NotFound(format!("project '{project_id}' not found")));
        }

        state.memberships.retain(|id, _| !memberships.contains(id));
        state
            .security_groups
            .retain(|_, group| !memberships.contains(&group.membership_id));
        state.roles.retain(|assignment| {
            !(assignment.level == ScopeLevel::Project && assignment.scope_id == project_id)
        });
        Ok(())
    }

    async fn add_project_to_group(
        &self,
        project_id: Uuid,
        project_group_id: Uuid,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        if !state.project_groups.contains_key(&project_group_id) {
            return Err(AppError::NotFound(format!(
                "project group '{project_group_id}' not found"
            )));
        }
        let project = state
            .projects
            .get_mut(&project_id)
            .ok_or_else(|| AppError::NotFound(format!("project '{project_id}' not found")))?;

        if !project.project_group_ids.contains(&project_group_id) {
            project.project_group_ids.push(project_group_id);
        }
        Ok(())
    }

    async fn remove_project_from_group(
        &self,
        project_id: Uuid,
        project_group_id: Uuid,
    ) -> AppResult<()> {
        if let Some(project) = self.state.write().await.projects.get_mut(&project_id) {
            project.project_group_ids.retain(|id| *id != project_group_id);
        }
        Ok(())
    }
}

#[async_trait]
impl RoleAssignmentRepository for InMemoryRepository {
    async fn list_role_assignments(
        &self,
        level: ScopeLevel,
        visible_scopes: &VisibleIds,
        user_id: Option<UserId>,
    ) -> AppResult<Vec<RoleAssignment>> {
        Ok(self
            .state
            .read()
            .await
            .roles
            .iter()
            .filter(|assignment| assignment.level == level)
            .filter(|assignment| visible_scopes.contains(&assignment.scope_id))
            .filter(|assignment| user_id.is_none_or(|user_id| assignment.user_id == user_id))
            .cloned()
            .collect())
    }

    async fn find_role_assignment(
        &self,
        assignment_id: Uuid,
    ) -> AppResult<Option<RoleAssignment>> {
        Ok(self
            .state
            .read()
            .await
            .roles
            .iter()
            .find(|assignment| assignment.id == assignment_id)
            .cloned())
    }

    async fn has_role(
        &self,
        user_id: UserId,
        level: ScopeLevel,
        scope_id: Uuid,
        role: Role,
    ) -> AppResult<bool> {
        Ok(self.state.read().await.roles.iter().any(|assignment| {
            assignment.user_id == user_id
                && assignment.level == level
                && assignment.scope_id == scope_id
                && assignment.role == role
        }))
    }

    async fn grant_role(&self, assignment: RoleAssignment) -> AppResult<RoleGrant> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.roles.iter().find(|stored| {
            stored.user_id == assignment.user_id
                && stored.level == assignment.level
                && stored.scope_id == assignment.scope_id
                && stored.role == assignment.role
        }) {
            return Ok(RoleGrant::AlreadyGranted(existing.clone()));
        }

        state.roles.push(assignment.clone());
        Ok(RoleGrant::Created(assignment))
    }

    async fn revoke_role(&self, assignment_id: Uuid) -> AppResult<()> {
        let mut state = self.state.write().await;
        let before = state.roles.len();
        state.roles.retain(|assignment| assignment.id != assignment_id);
        if state.roles.len() == before {
            return Err(AppError::NotFound(format!(
                "role assignment '{assignment_id}' not found"
            )));
        }
        Ok(())
    }
}
