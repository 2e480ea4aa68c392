use super::*;

#[derive(Debug, Default, Deserialize)]
pub struct CloudListParams {
    pub name: Option<String>,
    pub customer: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FlavorListParams {
    pub cloud: Option<Uuid>,
}

pub async fn list_clouds_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(params): Query<CloudListParams>,
) -> ApiResult<Json<Vec<CloudResponse>>> {
    let query = CloudListQuery {
        name: params.name.filter(|name| !name.trim().is_empty()),
        customer_id: params.customer,
    };
    let clouds = state
        .cloud_service
        .list_clouds(&user, &query)
        .await?
        .into_iter()
        .map(CloudResponse::from)
        .collect();

    Ok(Json(clouds))
}

pub async fn get_cloud_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(cloud_id): Path<Uuid>,
) -> ApiResult<Json<CloudResponse>> {
    let cloud = state.cloud_service.get_cloud(&user, cloud_id).await?;

    Ok(Json(CloudResponse::from(cloud)))
}

pub async fn create_cloud_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<CreateCloudRequest>,
) -> ApiResult<(StatusCode, Json<CloudResponse>)> {
    let cloud = state
        .cloud_service
        .create_cloud(
            &user,
            CreateCloudInput {
                customer_id: payload.customer_id,
                name: payload.name,
                auth_url: payload.auth_url,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(CloudResponse::from(cloud))))
}

pub async fn list_flavors_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(params): Query<FlavorListParams>,
) -> ApiResult<Json<Vec<FlavorResponse>>> {
    let flavors = state
        .cloud_service
        .list_flavors(&user, params.cloud)
        .await?
        .into_iter()
        .map(FlavorResponse::from)
        .collect();

    Ok(Json(flavors))
}
