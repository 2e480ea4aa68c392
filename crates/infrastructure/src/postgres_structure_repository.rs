//! PostgreSQL-backed customers, project groups, projects and role assignments.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nodeconductor_application::{
    RoleAssignmentRepository, RoleGrant, StructureListQuery, StructureRepository,
};
use nodeconductor_core::{AppError, AppResult, NonEmptyString, UserId};
use nodeconductor_domain::{
    Customer, Project, ProjectGroup, Role, RoleAssignment, ScopeLevel, VisibleIds,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::postgres_errors::reference_conflict_or_internal;

/// PostgreSQL implementation of the structure and role assignment ports.
#[derive(Clone)]
pub struct PostgresStructureRepository {
    pool: PgPool,
}

impl PostgresStructureRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct CustomerRow {
    id: Uuid,
    name: String,
    native_name: Option<String>,
    abbreviation: Option<String>,
    contact_details: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = AppError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: NonEmptyString::new(row.name)?,
            native_name: row.native_name,
            abbreviation: row.abbreviation,
            contact_details: row.contact_details,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ProjectGroupRow {
    id: Uuid,
    customer_id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProjectGroupRow> for ProjectGroup {
    type Error = AppError;

    fn try_from(row: ProjectGroupRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            customer_id: row.customer_id,
            name: NonEmptyString::new(row.name)?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ProjectRow {
    id: Uuid,
    customer_id: Uuid,
    name: String,
    description: Option<String>,
    project_group_ids: Vec<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProjectRow> for Project {
    type Error = AppError;

    fn try_from(row: ProjectRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            customer_id: row.customer_id,
            name: NonEmptyString::new(row.name)?,
            description: row.description,
            project_group_ids: row.project_group_ids,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct RoleAssignmentRow {
    id: Uuid,
    user_id: Uuid,
    level: String,
    scope_id: Uuid,
    role: String,
}

impl TryFrom<RoleAssignmentRow> for RoleAssignment {
    type Error = AppError;

    fn try_from(row: RoleAssignmentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: UserId::from_uuid(row.user_id),
            level: ScopeLevel::from_str(row.level.as_str())?,
            scope_id: row.scope_id,
            role: Role::from_str(row.role.as_str())?,
        })
    }
}

mod customers;
mod projects;
mod roles;


#[async_trait]
impl StructureRepository for PostgresStructureRepository {
    async fn list_customers(
        &self,
        visible: &VisibleIds,
        query: &StructureListQuery,
    ) -> AppResult<Vec<Customer>> {
        self.list_customers_impl(visible, query).await
    }

    async fn find_customer(&self, customer_id: Uuid) -> AppResult<Option<Customer>> {
        self.find_customer_impl(customer_id).await
    }

    async fn save_customer(&self, customer: Customer) -> AppResult<()> {
        self.save_customer_impl(customer).await
    }

    async fn delete_customer(&self, customer_id: Uuid) -> AppResult<()> {
        self.delete_customer_impl(customer_id).await
    }

    async fn list_project_groups(
        &self,
        visible: &VisibleIds,
        query: &StructureListQuery,
    ) -> AppResult<Vec<ProjectGroup>> {
        self.list_project_groups_impl(visible, query).await
    }

    async fn find_project_group(
        &self,
        project_group_id: Uuid,
    ) -> AppResult<Option<ProjectGroup>> {
        self.find_project_group_impl(project_group_id).await
    }

    async fn create_project_group(&self, project_group: ProjectGroup) -> AppResult<()> {
        self.create_project_group_impl(project_group).await
    }

    async fn delete_project_group(&self, project_group_id: Uuid) -> AppResult<()> {
        self.delete_project_group_impl(project_group_id).await
    }

    async fn list_projects(
        &self,
        visible: &VisibleIds,
        query: &StructureListQuery,
    ) -> AppResult<Vec<Project>> {
        self.list_projects_impl(visible, query).await
    }

    async fn find_project(&self, project_id: Uuid) -> AppResult<Option<Project>> {
        self.find_project_impl(project_id).await
    }

    async fn create_project(&self, project: Project) -> AppResult<()> {
        self.create_project_impl(project).await
    }

    async fn delete_project(&self, project_id: Uuid) -> AppResult<()> {
        self.delete_project_impl(project_id).await
    }

    async fn add_project_to_group(
        &self,
        project_id: Uuid,
        project_group_id: Uuid,
    ) -> AppResult<()> {
        self.add_project_to_group_impl(project_id, project_group_id)
            .await
    }

    async fn remove_project_from_group(
        &self,
        project_id: Uuid,
        project_group_id: Uuid,
    ) -> AppResult<()> {
        self.remove_project_from_group_impl(project_id, project_group_id)
            .await
    }
}

#[async_trait]
impl RoleAssignmentRepository for PostgresStructureRepository {
    async fn list_role_assignments(
        &self,
        level: ScopeLevel,
        visible_scopes: &VisibleIds,
        user_id: Option<UserId>,
    ) -> AppResult<Vec<RoleAssignment>> {
        self.list_role_assignments_impl(level, visible_scopes, user_id)
            .await
    }

    async fn find_role_assignment(
        &self,
        assignment_id: Uuid,
    ) -> AppResult<Option<RoleAssignment>> {
        self.find_role_assignment_impl(assignment_id).await
    }

    async fn has_role(
        &self,
        user_id: UserId,
        level: ScopeLevel,
        scope_id: Uuid,
        role: Role,
    ) -> AppResult<bool> {
        self.has_role_impl(user_id, level, scope_id, role).await
    }

    async fn grant_role(&self, assignment: RoleAssignment) -> AppResult<RoleGrant> {
        self.grant_role_impl(assignment).await
    }

    async fn revoke_role(&self, assignment_id: Uuid) -> AppResult<()> {
        self.revoke_role_impl(assignment_id).await
    }
}
