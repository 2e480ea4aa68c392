use std::str::FromStr;

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use nodeconductor_application::{
    CreateInstanceInput, InstanceListQuery, InstanceOrdering, OperationScheduled,
    ResizeInstanceInput, UpdateInstanceInput,
};
use nodeconductor_core::{AppError, AppResult, UserIdentity};
use nodeconductor_domain::{InstanceOperation, InstanceState};
use serde::Deserialize;
use uuid::Uuid;

use crate::dto::{
    CreateInstanceRequest, InstanceResponse, OperationStatusResponse, ResizeInstanceRequest,
    UpdateInstanceRequest,
};
use crate::error::ApiResult;
use crate::state::AppState;

#[cfg(test)]
mod tests;

#[derive(Debug, Default, Deserialize)]
pub struct InstanceListParams {
    pub hostname: Option<String>,
    pub state: Option<String>,
    pub project: Option<Uuid>,
    pub customer: Option<Uuid>,
    pub o: Option<String>,
}

impl TryFrom<InstanceListParams> for InstanceListQuery {
    type Error = AppError;

    fn try_from(params: InstanceListParams) -> Result<Self, Self::Error> {
        Ok(Self {
            hostname: params.hostname.filter(|value| !value.trim().is_empty()),
            state: params.state.as_deref().map(InstanceState::from_str).transpose()?,
            project_id: params.project,
            customer_id: params.customer,
            ordering: params
                .o
                .as_deref()
                .map(InstanceOrdering::from_str)
                .transpose()?
                .unwrap_or_default(),
        })
    }
}

pub async fn list_instances_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(params): Query<InstanceListParams>,
) -> ApiResult<Json<Vec<InstanceResponse>>> {
    let query = InstanceListQuery::try_from(params)?;
    let instances = state
        .instance_service
        .list_instances(&user, &query)
        .await?
        .into_iter()
        .map(InstanceResponse::from)
        .collect();

    Ok(Json(instances))
}

pub async fn get_instance_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(instance_id): Path<Uuid>,
) -> ApiResult<Json<InstanceResponse>> {
    let instance = state
        .instance_service
        .get_instance(&user, instance_id)
        .await?;

    Ok(Json(InstanceResponse::from(instance)))
}

pub async fn create_instance_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<CreateInstanceRequest>,
) -> ApiResult<(StatusCode, Json<InstanceResponse>)> {
    let instance = state
        .instance_service
        .create_instance(
            &user,
            CreateInstanceInput {
                project_id: payload.project_id,
                flavor_id: payload.flavor_id,
                hostname: payload.hostname,
                description: payload.description,
                template_name: payload.template_name,
                agreed_sla: payload.agreed_sla,
                data_volume_size: payload.data_volume_size,
                security_group_ids: payload.security_group_ids,
                ssh_key_id: payload.ssh_key_id,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(InstanceResponse::from(instance))))
}

pub async fn update_instance_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(instance_id): Path<Uuid>,
    Json(payload): Json<UpdateInstanceRequest>,
) -> ApiResult<Json<InstanceResponse>> {
    let instance = state
        .instance_service
        .update_instance(
            &user,
            instance_id,
            UpdateInstanceInput {
                hostname: payload.hostname,
                description: payload.description,
                security_group_ids: payload.security_group_ids,
            },
        )
        .await?;

    Ok(Json(InstanceResponse::from(instance)))
}

pub async fn start_instance_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(instance_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<OperationStatusResponse>)> {
    operation_response(
        state
            .instance_service
            .schedule_operation(&user, instance_id, InstanceOperation::Start)
            .await,
    )
}

pub async fn stop_instance_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(instance_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<OperationStatusResponse>)> {
    operation_response(
        state
            .instance_service
            .schedule_operation(&user, instance_id, InstanceOperation::Stop)
            .await,
    )
}

pub async fn destroy_instance_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(instance_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<OperationStatusResponse>)> {
    operation_response(
        state
            .instance_service
            .schedule_operation(&user, instance_id, InstanceOperation::Destroy)
            .await,
    )
}

pub async fn resize_instance_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(instance_id): Path<Uuid>,
    Json(payload): Json<ResizeInstanceRequest>,
) -> ApiResult<(StatusCode, Json<OperationStatusResponse>)> {
    operation_response(
        state
            .instance_service
            .resize(
                &user,
                instance_id,
                ResizeInstanceInput {
                    flavor_id: payload.flavor,
                    disk_size: payload.disk_size,
                },
            )
            .await,
    )
}

/// Scheduled operations answer 202, rejected transitions 409, both with a
/// `status` message.
fn operation_response(
    result: AppResult<OperationScheduled>,
) -> ApiResult<(StatusCode, Json<OperationStatusResponse>)> {
    match result {
        Ok(scheduled) => Ok((
            StatusCode::ACCEPTED,
            Json(OperationStatusResponse {
                status: scheduled.message,
            }),
        )),
        Err(AppError::Conflict(message)) => Ok((
            StatusCode::CONFLICT,
            Json(OperationStatusResponse { status: message }),
        )),
        Err(error) => Err(error.into()),
    }
}
