use super::*;

pub async fn list_project_groups_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(params): Query<StructureListParams>,
) -> ApiResult<Json<Vec<ProjectGroupResponse>>> {
    let project_groups = state
        .structure_service
        .list_project_groups(&user, &params.into())
        .await?
        .into_iter()
        .map(ProjectGroupResponse::from)
        .collect();

    Ok(Json(project_groups))
}

pub async fn get_project_group_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(project_group_id): Path<Uuid>,
) -> ApiResult<Json<ProjectGroupResponse>> {
    let project_group = state
        .structure_service
        .get_project_group(&user, project_group_id)
        .await?;

    Ok(Json(ProjectGroupResponse::from(project_group)))
}

pub async fn create_project_group_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<CreateProjectGroupRequest>,
) -> ApiResult<(StatusCode, Json<ProjectGroupResponse>)> {
    let project_group = state
        .structure_service
        .create_project_group(
            &user,
            CreateProjectGroupInput {
                customer_id: payload.customer_id,
                name: payload.name,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ProjectGroupResponse::from(project_group)),
    ))
}

pub async fn delete_project_group_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(project_group_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .structure_service
        .delete_project_group(&user, project_group_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_projects_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(params): Query<StructureListParams>,
) -> ApiResult<Json<Vec<ProjectResponse>>> {
    let projects = state
        .structure_service
        .list_projects(&user, &params.into())
        .await?;
    let memberships = state.cloud_service.list_memberships(&user).await?;

    Ok(Json(
        projects
            .into_iter()
            .map(|project| ProjectResponse::compose(project, &memberships))
            .collect(),
    ))
}

pub async fn get_project_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<ProjectResponse>> {
    let project = state.structure_service.get_project(&user, project_id).await?;
    let memberships = state.cloud_service.list_memberships(&user).await?;

    Ok(Json(ProjectResponse::compose(project, &memberships)))
}

pub async fn create_project_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<ProjectResponse>)> {
    let project = state
        .structure_service
        .create_project(
            &user,
            CreateProjectInput {
                customer_id: payload.customer_id,
                name: payload.name,
                description: payload.description,
                project_group_id: payload.project_group_id,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ProjectResponse::compose(project, &[])),
    ))
}

pub async fn delete_project_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .structure_service
        .delete_project(&user, project_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_project_to_group_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<ProjectGroupLinkRequest>,
) -> ApiResult<Json<ProjectResponse>> {
    let project = state
        .structure_service
        .add_project_to_group(&user, project_id, payload.project_group_id)
        .await?;
    let memberships = state.cloud_service.list_memberships(&user).await?;

    Ok(Json(ProjectResponse::compose(project, &memberships)))
}

pub async fn remove_project_from_group_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path((project_id, project_group_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<ProjectResponse>> {
    let project = state
        .structure_service
        .remove_project_from_group(&user, project_id, project_group_id)
        .await?;
    let memberships = state.cloud_service.list_memberships(&user).await?;

    Ok(Json(ProjectResponse::compose(project, &memberships)))
}
