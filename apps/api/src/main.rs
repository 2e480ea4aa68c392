//! NodeConductor API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod api_services;
mod auth;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use nodeconductor_core::AppError;
use tracing::info;

use crate::api_config::{ApiConfig, init_tracing};
use crate::api_router::build_router;
use crate::api_services::{build_app_state, build_postgres_session_layer, connect_and_migrate};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;
    let pool = connect_and_migrate(&config.database_url).await?;

    if config.migrate_only {
        info!("database migrations applied");
        return Ok(());
    }

    let session_layer = build_postgres_session_layer(pool.clone(), config.session).await?;
    let app_state = build_app_state(pool, &config)?;

    if let Some((username, password)) = &config.bootstrap_staff {
        app_state
            .user_service
            .ensure_staff_user(username, password)
            .await?;
        info!(%username, "bootstrap staff user ensured");
    }

    let app = build_router(app_state, session_layer)?;
    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, "nodeconductor-api listening");

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("api server error: {error}")))
}
