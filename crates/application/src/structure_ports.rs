use async_trait::async_trait;
use nodeconductor_core::{AppResult, UserId};
use nodeconductor_domain::{
    Customer, Project, ProjectGroup, Role, RoleAssignment, ScopeLevel, VisibleIds,
};
use uuid::Uuid;

/// Filters shared by customer, project group and project listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructureListQuery {
    /// Case-insensitive name fragment.
    pub name: Option<String>,
    /// Owning customer (ignored for customer listings).
    pub customer_id: Option<Uuid>,
}

/// Customer creation payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCustomerInput {
    /// Display name.
    pub name: String,
    /// Native-language name.
    pub native_name: Option<String>,
    /// Short code.
    pub abbreviation: Option<String>,
    /// Contact details.
    pub contact_details: Option<String>,
}

/// Partial customer update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateCustomerInput {
    /// New display name.
    pub name: Option<String>,
    /// New native-language name.
    pub native_name: Option<String>,
    /// New short code.
    pub abbreviation: Option<String>,
    /// New contact details.
    pub contact_details: Option<String>,
}

/// Project group creation payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateProjectGroupInput {
    /// Owning customer.
    pub customer_id: Uuid,
    /// Display name.
    pub name: String,
}

/// Project creation payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateProjectInput {
    /// Owning customer.
    pub customer_id: Uuid,
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Group to place the project in.
    pub project_group_id: Option<Uuid>,
}

/// Role grant payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantRoleInput {
    /// Grantee.
    pub user_id: UserId,
    /// Level of the scope entity.
    pub level: ScopeLevel,
    /// Customer, project group or project identifier.
    pub scope_id: Uuid,
    /// Granted role.
    pub role: Role,
}

/// Outcome of a role grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleGrant {
    /// A new assignment was stored.
    Created(RoleAssignment),
    /// The same assignment already existed.
    AlreadyGranted(RoleAssignment),
}

/// Repository port for customers, project groups and projects.
#[async_trait]
pub trait StructureRepository: Send + Sync {
    /// Lists visible customers.
    async fn list_customers(
        &self,
        visible: &VisibleIds,
        query: &StructureListQuery,
    ) -> AppResult<Vec<Customer>>;

    /// Returns one customer.
    async fn find_customer(&self, customer_id: Uuid) -> AppResult<Option<Customer>>;

    /// Inserts or updates one customer.
    async fn save_customer(&self, customer: Customer) -> AppResult<()>;

    /// Deletes one customer; fails with `Conflict` while projects remain.
    async fn delete_customer(&self, customer_id: Uuid) -> AppResult<()>;

    /// Lists visible project groups.
    async fn list_project_groups(
        &self,
        visible: &VisibleIds,
        query: &StructureListQuery,
    ) -> AppResult<Vec<ProjectGroup>>;

    /// Returns one project group.
    async fn find_project_group(&self, project_group_id: Uuid)
    -> AppResult<Option<ProjectGroup>>;

    /// Inserts one project group.
    async fn create_project_group(&self, project_group: ProjectGroup) -> AppResult<()>;

    /// Deletes one project group and its memberships and role assignments.
    async fn delete_project_group(&self, project_group_id: Uuid) -> AppResult<()>;

    /// Lists visible projects.
    async fn list_projects(
        &self,
        visible: &VisibleIds,
        query: &StructureListQuery,
    ) -> AppResult<Vec<Project>>;

    /// Returns one project with its group identifiers.
    async fn find_project(&self, project_id: Uuid) -> AppResult<Option<Project>>;

    /// Inserts one project with its group links.
    async fn create_project(&self, project: Project) -> AppResult<()>;

    /// Deletes one project; fails with `Conflict` while instances remain.
    async fn delete_project(&self, project_id: Uuid) -> AppResult<()>;

    /// Links a project to a group; linking twice is a no-op.
    async fn add_project_to_group(&self, project_id: Uuid, project_group_id: Uuid)
    -> AppResult<()>;

    /// Unlinks a project from a group.
    async fn remove_project_from_group(
        &self,
        project_id: Uuid,
        project_group_id: Uuid,
    ) -> AppResult<()>;
}

/// Repository port for structure role assignments.
#[async_trait]
pub trait RoleAssignmentRepository: Send + Sync {
    /// Lists assignments at one level whose scope entity is visible.
    async fn list_role_assignments(
        &self,
        level: ScopeLevel,
        visible_scopes: &VisibleIds,
        user_id: Option<UserId>,
    ) -> AppResult<Vec<RoleAssignment>>;

    /// Returns one assignment.
    async fn find_role_assignment(&self, assignment_id: Uuid)
    -> AppResult<Option<RoleAssignment>>;

    /// Returns whether the user holds the role on the scope entity.
    async fn has_role(
        &self,
        user_id: UserId,
        level: ScopeLevel,
        scope_id: Uuid,
        role: Role,
    ) -> AppResult<bool>;

    /// Stores the assignment unless an identical one exists.
    async fn grant_role(&self, assignment: RoleAssignment) -> AppResult<RoleGrant>;

    /// Deletes one assignment.
    async fn revoke_role(&self, assignment_id: Uuid) -> AppResult<()>;
}
