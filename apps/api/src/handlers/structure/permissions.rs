use super::*;

#[derive(Debug, Default, Deserialize)]
pub struct RoleListParams {
    pub user: Option<Uuid>,
}

pub async fn list_customer_roles_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(params): Query<RoleListParams>,
) -> ApiResult<Json<Vec<RoleAssignmentResponse>>> {
    list_roles(&state, &user, ScopeLevel::Customer, params).await
}

pub async fn list_project_group_roles_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(params): Query<RoleListParams>,
) -> ApiResult<Json<Vec<RoleAssignmentResponse>>> {
    list_roles(&state, &user, ScopeLevel::ProjectGroup, params).await
}

pub async fn list_project_roles_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(params): Query<RoleListParams>,
) -> ApiResult<Json<Vec<RoleAssignmentResponse>>> {
    list_roles(&state, &user, ScopeLevel::Project, params).await
}

pub async fn grant_customer_role_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<GrantRoleRequest>,
) -> ApiResult<Response> {
    grant_role(&state, &user, ScopeLevel::Customer, payload).await
}

pub async fn grant_project_group_role_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<GrantRoleRequest>,
) -> ApiResult<Response> {
    grant_role(&state, &user, ScopeLevel::ProjectGroup, payload).await
}

pub async fn grant_project_role_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<GrantRoleRequest>,
) -> ApiResult<Response> {
    grant_role(&state, &user, ScopeLevel::Project, payload).await
}

pub async fn revoke_role_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(assignment_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .structure_service
        .revoke_role(&user, assignment_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn list_roles(
    state: &AppState,
    user: &UserIdentity,
    level: ScopeLevel,
    params: RoleListParams,
) -> ApiResult<Json<Vec<RoleAssignmentResponse>>> {
    let assignments = state
        .structure_service
        .list_role_assignments(user, level, params.user.map(UserId::from_uuid))
        .await?
        .into_iter()
        .map(RoleAssignmentResponse::from)
        .collect();

    Ok(Json(assignments))
}

/// Answers 201 for a new assignment and 304 when it already existed.
async fn grant_role(
    state: &AppState,
    user: &UserIdentity,
    level: ScopeLevel,
    payload: GrantRoleRequest,
) -> ApiResult<Response> {
    let grant = state
        .structure_service
        .grant_role(
            user,
            GrantRoleInput {
                user_id: UserId::from_uuid(payload.user_id),
                level,
                scope_id: payload.scope_id,
                role: payload.role,
            },
        )
        .await?;

    Ok(match grant {
        RoleGrant::Created(assignment) => (
            StatusCode::CREATED,
            Json(RoleAssignmentResponse::from(assignment)),
        )
            .into_response(),
        RoleGrant::AlreadyGranted(_) => StatusCode::NOT_MODIFIED.into_response(),
    })
}
