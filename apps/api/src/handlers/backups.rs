use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use nodeconductor_application::CreateBackupInput;
use nodeconductor_core::UserIdentity;
use uuid::Uuid;

use crate::dto::{BackupResponse, CreateBackupRequest, OperationStatusResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_backups_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
) -> ApiResult<Json<Vec<BackupResponse>>> {
    let backups = state
        .backup_service
        .list_backups(&user)
        .await?
        .into_iter()
        .map(BackupResponse::from)
        .collect();

    Ok(Json(backups))
}

pub async fn get_backup_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(backup_id): Path<Uuid>,
) -> ApiResult<Json<BackupResponse>> {
    let backup = state.backup_service.get_backup(&user, backup_id).await?;

    Ok(Json(BackupResponse::from(backup)))
}

pub async fn create_backup_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<CreateBackupRequest>,
) -> ApiResult<(StatusCode, Json<BackupResponse>)> {
    let backup = state
        .backup_service
        .create_backup(
            &user,
            CreateBackupInput {
                instance_id: payload.instance_id,
                description: payload.description,
                kept_until: payload.kept_until,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(BackupResponse::from(backup))))
}

pub async fn restore_backup_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(backup_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<OperationStatusResponse>)> {
    let status = state.backup_service.restore_backup(&user, backup_id).await?;

    Ok((StatusCode::ACCEPTED, Json(OperationStatusResponse { status })))
}

pub async fn delete_backup_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(backup_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<OperationStatusResponse>)> {
    let status = state.backup_service.delete_backup(&user, backup_id).await?;

    Ok((StatusCode::ACCEPTED, Json(OperationStatusResponse { status })))
}
