use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use nodeconductor_application::{CloudListQuery, CreateCloudInput, SecurityGroupListQuery};
use nodeconductor_core::UserIdentity;
use serde::Deserialize;
use uuid::Uuid;

use crate::dto::{
    CloudResponse, CreateCloudRequest, CreateMembershipRequest, CreateSshKeyRequest,
    FlavorResponse, MembershipResponse, SecurityGroupResponse, SshKeyResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

mod clouds;
mod memberships;
mod ssh_keys;

#[cfg(test)]
mod tests;

pub use clouds::{
    create_cloud_handler, get_cloud_handler, list_clouds_handler, list_flavors_handler,
};
pub use memberships::{
    create_membership_handler, get_membership_handler, list_memberships_handler,
    list_security_groups_handler,
};
pub use ssh_keys::{
    create_ssh_key_handler, delete_ssh_key_handler, get_ssh_key_handler, list_ssh_keys_handler,
};
