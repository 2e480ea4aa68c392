use axum::Json;
use axum::extract::State;
use nodeconductor_core::AppError;
use tower_sessions::Session;
use tracing::info;

use crate::dto::{LoginRequest, UserIdentityResponse};
use crate::error::ApiResult;
use crate::state::AppState;

use super::SESSION_USER_KEY;

pub async fn login_handler(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<UserIdentityResponse>> {
    let identity = state
        .user_service
        .login(payload.username.trim(), payload.password.as_str())
        .await?;

    session
        .cycle_id()
        .await
        .map_err(|error| AppError::Internal(format!("failed to cycle session id: {error}")))?;

    session
        .insert(SESSION_USER_KEY, &identity)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to persist session identity: {error}"))
        })?;

    info!(user_id = %identity.user_id(), "user logged in");
    Ok(Json(UserIdentityResponse::from(identity)))
}
