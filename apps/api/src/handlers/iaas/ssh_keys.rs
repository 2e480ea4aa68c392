use super::*;

pub async fn list_ssh_keys_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
) -> ApiResult<Json<Vec<SshKeyResponse>>> {
    let keys = state
        .ssh_key_service
        .list_keys(&user)
        .await?
        .into_iter()
        .map(SshKeyResponse::from)
        .collect();

    Ok(Json(keys))
}

pub async fn get_ssh_key_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(key_id): Path<Uuid>,
) -> ApiResult<Json<SshKeyResponse>> {
    let key = state.ssh_key_service.get_key(&user, key_id).await?;

    Ok(Json(SshKeyResponse::from(key)))
}

pub async fn create_ssh_key_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<CreateSshKeyRequest>,
) -> ApiResult<(StatusCode, Json<SshKeyResponse>)> {
    let key = state
        .ssh_key_service
        .create_key(&user, payload.name.as_str(), payload.public_key.as_str())
        .await?;

    Ok((StatusCode::CREATED, Json(SshKeyResponse::from(key))))
}

pub async fn delete_ssh_key_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(key_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.ssh_key_service.delete_key(&user, key_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
