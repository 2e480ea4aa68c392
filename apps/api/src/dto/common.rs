use nodeconductor_core::UserIdentity;
use serde::{Deserialize, Serialize};

/// Health response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Incoming payload for password login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// API representation of the authenticated user.
#[derive(Debug, Serialize)]
pub struct UserIdentityResponse {
    pub user_id: String,
    pub username: String,
    pub full_name: String,
    pub is_staff: bool,
}

impl From<UserIdentity> for UserIdentityResponse {
    fn from(identity: UserIdentity) -> Self {
        Self {
            user_id: identity.user_id().to_string(),
            username: identity.username().to_owned(),
            full_name: identity.full_name().to_owned(),
            is_staff: identity.is_staff(),
        }
    }
}

/// Outcome of an asynchronous action endpoint.
#[derive(Debug, Serialize)]
pub struct OperationStatusResponse {
    pub status: String,
}
