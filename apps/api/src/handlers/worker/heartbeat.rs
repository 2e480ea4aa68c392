use super::*;

#[derive(Debug, Default, Deserialize)]
pub struct WorkerHeartbeatRequest {
    pub claimed_tasks: Option<u32>,
    pub executed_tasks: Option<u32>,
    pub failed_tasks: Option<u32>,
}

pub async fn worker_heartbeat_handler(
    State(state): State<AppState>,
    Extension(worker): Extension<WorkerIdentity>,
    Json(payload): Json<WorkerHeartbeatRequest>,
) -> ApiResult<StatusCode> {
    state
        .task_queue_service
        .heartbeat_worker(
            worker.worker_id(),
            WorkerHeartbeatInput {
                claimed_tasks: payload.claimed_tasks.unwrap_or(0),
                executed_tasks: payload.executed_tasks.unwrap_or(0),
                failed_tasks: payload.failed_tasks.unwrap_or(0),
            },
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
