use async_trait::async_trait;
use nodeconductor_core::AppResult;
use nodeconductor_domain::AuditAction;
use tracing::warn;
use uuid::Uuid;

/// Immutable audit event payload emitted by application services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// User id or worker id that performed the action.
    pub subject: String,
    /// Stable audit action identifier.
    pub action: AuditAction,
    /// Entity kind label, for example `instance` or `cloud`.
    pub resource_type: String,
    /// Id of the entity the action touched.
    pub resource_id: Uuid,
    /// Optional audit detail payload.
    pub detail: Option<String>,
}

/// Port for persisting append-only audit events.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Persists one audit event.
    async fn append_event(&self, event: AuditEvent) -> AppResult<()>;

    /// Appends an event after the audited write has committed. Failures are
    /// logged and never reach the caller.
    async fn record(&self, event: AuditEvent) {
        let action = event.action;
        let resource_id = event.resource_id;
        if let Err(error) = self.append_event(event).await {
            warn!(
                action = action.as_str(),
                %resource_id,
                error = %error,
                "failed to record audit event"
            );
        }
    }
}
