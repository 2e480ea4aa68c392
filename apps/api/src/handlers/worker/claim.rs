use super::*;

#[derive(Debug, Default, Deserialize)]
pub struct ClaimTasksRequest {
    pub limit: Option<usize>,
    pub lease_seconds: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ClaimedTasksResponse {
    pub tasks: Vec<ClaimedTaskResponse>,
}

#[derive(Debug, Serialize)]
pub struct ClaimedTaskResponse {
    pub job_id: Uuid,
    pub task: TaskName,
    pub entity_id: Uuid,
    pub payload: Value,
    pub attempt: i32,
    pub lease_token: String,
    pub leased_until: String,
}

pub async fn claim_tasks_handler(
    State(state): State<AppState>,
    Extension(worker): Extension<WorkerIdentity>,
    Json(payload): Json<ClaimTasksRequest>,
) -> ApiResult<Json<ClaimedTasksResponse>> {
    let requested_limit = payload.limit.unwrap_or(state.worker_max_claim_limit);
    let requested_lease_seconds = payload
        .lease_seconds
        .unwrap_or(state.worker_default_lease_seconds);

    let effective_limit = requested_limit.clamp(1, state.worker_max_claim_limit);
    let effective_lease_seconds = requested_lease_seconds.max(1);

    let tasks = state
        .task_queue_service
        .claim_tasks_for_worker(worker.worker_id(), effective_limit, effective_lease_seconds)
        .await?
        .into_iter()
        .map(|task| ClaimedTaskResponse {
            job_id: task.job_id,
            task: task.task,
            entity_id: task.entity_id,
            payload: task.payload,
            attempt: task.attempt,
            lease_token: task.lease_token,
            leased_until: task.leased_until.to_rfc3339(),
        })
        .collect();

    Ok(Json(ClaimedTasksResponse { tasks }))
}
