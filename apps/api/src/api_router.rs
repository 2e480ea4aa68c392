use axum::Router;
use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use nodeconductor_core::AppError;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tower_sessions::SessionManagerLayer;
use tower_sessions_sqlx_store::PostgresStore;

use crate::state::AppState;
use crate::{auth, handlers, middleware};

mod protected;
mod worker_internal;

use protected::build_protected_routes;
use worker_internal::build_worker_internal_routes;

/// Assembles public, session-protected and worker-internal routes.
pub fn build_router(
    app_state: AppState,
    session_layer: SessionManagerLayer<PostgresStore>,
) -> Result<Router, AppError> {
    let frontend_origin = HeaderValue::from_str(app_state.frontend_url.as_str())
        .map_err(|error| AppError::Validation(format!("invalid FRONTEND_URL: {error}")))?;
    let cors_layer = CorsLayer::new()
        .allow_origin(frontend_origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([ACCEPT, CONTENT_TYPE]);

    Ok(Router::new()
        .route("/health", get(handlers::health::health_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .merge(build_protected_routes())
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_same_origin_for_mutations,
        ))
        .merge(build_worker_internal_routes(app_state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .layer(session_layer)
        .with_state(app_state))
}
