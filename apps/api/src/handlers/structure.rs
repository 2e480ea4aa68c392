use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use nodeconductor_application::{
    CreateCustomerInput, CreateProjectGroupInput, CreateProjectInput, GrantRoleInput, RoleGrant,
    StructureListQuery, UpdateCustomerInput,
};
use nodeconductor_core::{UserId, UserIdentity};
use nodeconductor_domain::ScopeLevel;
use serde::Deserialize;
use uuid::Uuid;

use crate::dto::{
    CreateCustomerRequest, CreateProjectGroupRequest, CreateProjectRequest, CustomerResponse,
    GrantRoleRequest, ProjectGroupLinkRequest, ProjectGroupResponse, ProjectResponse,
    RoleAssignmentResponse, UpdateCustomerRequest,
};
use crate::error::ApiResult;
use crate::state::AppState;

mod customers;
mod permissions;
mod projects;


pub use customers::{
    create_customer_handler, delete_customer_handler, get_customer_handler,
    list_customers_handler, update_customer_handler,
};
pub use permissions::{
    grant_customer_role_handler, grant_project_group_role_handler, grant_project_role_handler,
    list_customer_roles_handler, list_project_group_roles_handler, list_project_roles_handler,
    revoke_role_handler,
};
pub use projects::{
    add_project_to_group_handler, create_project_group_handler, create_project_handler,
    delete_project_group_handler, delete_project_handler, get_project_group_handler,
    get_project_handler, list_project_groups_handler, list_projects_handler,
    remove_project_from_group_handler,
};

/// Name and customer filters shared by the structure listings.
#[derive(Debug, Default, Deserialize)]
pub struct StructureListParams {
    pub name: Option<String>,
    pub customer: Option<Uuid>,
}

impl From<StructureListParams> for StructureListQuery {
    fn from(params: StructureListParams) -> Self {
        Self {
            name: params.name.filter(|name| !name.trim().is_empty()),
            customer_id: params.customer,
        }
    }
}
