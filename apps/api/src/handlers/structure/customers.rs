use super::*;

pub async fn list_customers_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(params): Query<StructureListParams>,
) -> ApiResult<Json<Vec<CustomerResponse>>> {
    let customers = state
        .structure_service
        .list_customers(&user, &params.into())
        .await?
        .into_iter()
        .map(CustomerResponse::from)
        .collect();

    Ok(Json(customers))
}

pub async fn get_customer_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(customer_id): Path<Uuid>,
) -> ApiResult<Json<CustomerResponse>> {
    let customer = state
        .structure_service
        .get_customer(&user, customer_id)
        .await?;

    Ok(Json(CustomerResponse::from(customer)))
}

pub async fn create_customer_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<CreateCustomerRequest>,
) -> ApiResult<(StatusCode, Json<CustomerResponse>)> {
    let customer = state
        .structure_service
        .create_customer(
            &user,
            CreateCustomerInput {
                name: payload.name,
                native_name: payload.native_name,
                abbreviation: payload.abbreviation,
                contact_details: payload.contact_details,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(CustomerResponse::from(customer))))
}

pub async fn update_customer_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(customer_id): Path<Uuid>,
    Json(payload): Json<UpdateCustomerRequest>,
) -> ApiResult<Json<CustomerResponse>> {
    let customer = state
        .structure_service
        .update_customer(
            &user,
            customer_id,
            UpdateCustomerInput {
                name: payload.name,
                native_name: payload.native_name,
                abbreviation: payload.abbreviation,
                contact_details: payload.contact_details,
            },
        )
        .await?;

    Ok(Json(CustomerResponse::from(customer)))
}

pub async fn delete_customer_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(customer_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .structure_service
        .delete_customer(&user, customer_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
