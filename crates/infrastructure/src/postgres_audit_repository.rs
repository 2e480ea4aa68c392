use async_trait::async_trait;
use sqlx::PgPool;

use nodeconductor_application::{AuditEvent, AuditRepository};
use nodeconductor_core::{AppError, AppResult};

/// Audit log writer backed by the `audit_log_entries` table.
#[derive(Clone)]
pub struct PostgresAuditRepository {
    pool: PgPool,
}

impl PostgresAuditRepository {
    /// Creates an audit writer on the shared pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for PostgresAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        let AuditEvent {
            subject,
            action,
            resource_type,
            resource_id,
            detail,
        } = event;

        sqlx::query(
            r#"
            INSERT INTO audit_log_entries (subject, action, resource_type, resource_id, detail)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(subject)
        .bind(action.as_str())
        .bind(resource_type)
        .bind(resource_id)
        .bind(detail)
        .execute(&self.pool)
        .await
        .map(|_| ())
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to record audit event for {resource_id}: {error}"
            ))
        })
    }
}
