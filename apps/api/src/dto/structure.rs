use nodeconductor_domain::{
    CloudProjectMembership, Customer, Project, ProjectGroup, Role, RoleAssignment, ScopeLevel,
    SynchronizationState,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Incoming payload for customer creation.
#[derive(Debug, Deserialize)]
pub struct CreateCustomerRequest {
    pub name: String,
    pub native_name: Option<String>,
    pub abbreviation: Option<String>,
    pub contact_details: Option<String>,
}

/// Incoming payload for partial customer updates.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateCustomerRequest {
    pub name: Option<String>,
    pub native_name: Option<String>,
    pub abbreviation: Option<String>,
    pub contact_details: Option<String>,
}

/// API representation of a customer.
#[derive(Debug, Serialize)]
pub struct CustomerResponse {
    pub id: Uuid,
    pub name: String,
    pub native_name: Option<String>,
    pub abbreviation: Option<String>,
    pub contact_details: Option<String>,
    pub created_at: String,
}

impl From<Customer> for CustomerResponse {
    fn from(customer: Customer) -> Self {
        Self {
            id: customer.id,
            name: customer.name.into(),
            native_name: customer.native_name,
            abbreviation: customer.abbreviation,
            contact_details: customer.contact_details,
            created_at: customer.created_at.to_rfc3339(),
        }
    }
}

/// Incoming payload for project group creation.
#[derive(Debug, Deserialize)]
pub struct CreateProjectGroupRequest {
    pub customer_id: Uuid,
    pub name: String,
}

/// API representation of a project group.
#[derive(Debug, Serialize)]
pub struct ProjectGroupResponse {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub name: String,
    pub created_at: String,
}

impl From<ProjectGroup> for ProjectGroupResponse {
    fn from(project_group: ProjectGroup) -> Self {
        Self {
            id: project_group.id,
            customer_id: project_group.customer_id,
            name: project_group.name.into(),
            created_at: project_group.created_at.to_rfc3339(),
        }
    }
}

/// Incoming payload for project creation.
#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub customer_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub project_group_id: Option<Uuid>,
}

/// Incoming payload for adding or removing a project group link.
#[derive(Debug, Deserialize)]
pub struct ProjectGroupLinkRequest {
    pub project_group_id: Uuid,
}

/// Cloud connected to a project through a membership.
#[derive(Debug, Serialize)]
pub struct ProjectCloudResponse {
    pub cloud_id: Uuid,
    pub membership_id: Uuid,
    pub state: SynchronizationState,
}

impl From<&CloudProjectMembership> for ProjectCloudResponse {
    fn from(membership: &CloudProjectMembership) -> Self {
        Self {
            cloud_id: membership.cloud_id,
            membership_id: membership.id,
            state: membership.state,
        }
    }
}

/// API representation of a project with its visible clouds.
#[derive(Debug, Serialize)]
pub struct ProjectResponse {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub project_group_ids: Vec<Uuid>,
    pub clouds: Vec<ProjectCloudResponse>,
    pub created_at: String,
}

impl ProjectResponse {
    /// Builds the representation from the project and the memberships visible
    /// to the caller; memberships of other projects are ignored.
    #[must_use]
    pub fn compose(project: Project, memberships: &[CloudProjectMembership]) -> Self {
        let clouds = memberships
            .iter()
            .filter(|membership| membership.project_id == project.id)
            .map(ProjectCloudResponse::from)
            .collect();

        Self {
            id: project.id,
            customer_id: project.customer_id,
            name: project.name.into(),
            description: project.description,
            project_group_ids: project.project_group_ids,
            clouds,
            created_at: project.created_at.to_rfc3339(),
        }
    }
}

/// Incoming payload for role grants.
#[derive(Debug, Deserialize)]
pub struct GrantRoleRequest {
    pub user_id: Uuid,
    pub scope_id: Uuid,
    pub role: Role,
}

/// API representation of a role assignment.
#[derive(Debug, Serialize)]
pub struct RoleAssignmentResponse {
    pub id: Uuid,
    pub user_id: String,
    pub level: ScopeLevel,
    pub scope_id: Uuid,
    pub role: Role,
}

impl From<RoleAssignment> for RoleAssignmentResponse {
    fn from(assignment: RoleAssignment) -> Self {
        Self {
            id: assignment.id,
            user_id: assignment.user_id.to_string(),
            level: assignment.level,
            scope_id: assignment.scope_id,
            role: assignment.role,
        }
    }
}
