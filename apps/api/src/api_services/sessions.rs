use nodeconductor_core::AppError;
use sqlx::PgPool;
use tower_sessions::cookie::SameSite;
use tower_sessions::cookie::time::Duration;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::api_config::SessionSettings;

const SESSION_TABLE: &str = "api_sessions";
const SESSION_COOKIE: &str = "nodeconductor_session";

/// Creates the session store table if needed and returns the cookie session layer.
pub async fn build_postgres_session_layer(
    pool: PgPool,
    settings: SessionSettings,
) -> Result<SessionManagerLayer<PostgresStore>, AppError> {
    let store = PostgresStore::new(pool)
        .with_table_name(SESSION_TABLE)
        .map_err(|error| AppError::Internal(format!("invalid session table: {error}")))?;
    store
        .migrate()
        .await
        .map_err(|error| AppError::Internal(format!("session store migration failed: {error}")))?;

    let idle = Duration::minutes(settings.idle_minutes);

    Ok(SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE)
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_secure(settings.cookie_secure)
        .with_expiry(Expiry::OnInactivity(idle)))
}
