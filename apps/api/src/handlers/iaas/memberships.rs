use super::*;

#[derive(Debug, Default, Deserialize)]
pub struct SecurityGroupListParams {
    pub cloud: Option<Uuid>,
    pub project: Option<Uuid>,
}

pub async fn list_memberships_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
) -> ApiResult<Json<Vec<MembershipResponse>>> {
    let memberships = state
        .cloud_service
        .list_memberships(&user)
        .await?
        .into_iter()
        .map(MembershipResponse::from)
        .collect();

    Ok(Json(memberships))
}

pub async fn get_membership_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(membership_id): Path<Uuid>,
) -> ApiResult<Json<MembershipResponse>> {
    let membership = state
        .cloud_service
        .get_membership(&user, membership_id)
        .await?;

    Ok(Json(MembershipResponse::from(membership)))
}

pub async fn create_membership_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<CreateMembershipRequest>,
) -> ApiResult<(StatusCode, Json<MembershipResponse>)> {
    let membership = state
        .cloud_service
        .create_membership(&user, payload.cloud_id, payload.project_id)
        .await?;

    Ok((StatusCode::CREATED, Json(MembershipResponse::from(membership))))
}

pub async fn list_security_groups_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(params): Query<SecurityGroupListParams>,
) -> ApiResult<Json<Vec<SecurityGroupResponse>>> {
    let query = SecurityGroupListQuery {
        cloud_id: params.cloud,
        project_id: params.project,
    };
    let security_groups = state
        .cloud_service
        .list_security_groups(&user, &query)
        .await?
        .into_iter()
        .map(SecurityGroupResponse::from)
        .collect();

    Ok(Json(security_groups))
}
