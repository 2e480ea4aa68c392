use chrono::{DateTime, Utc};
use nodeconductor_domain::{Backup, BackupState};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Incoming payload for backup creation.
#[derive(Debug, Deserialize)]
pub struct CreateBackupRequest {
    pub instance_id: Uuid,
    pub description: Option<String>,
    pub kept_until: Option<DateTime<Utc>>,
}

/// API representation of a backup. Backend metadata stays internal.
#[derive(Debug, Serialize)]
pub struct BackupResponse {
    pub id: Uuid,
    pub instance_id: Uuid,
    pub description: Option<String>,
    pub state: BackupState,
    pub kept_until: Option<String>,
    pub created_at: String,
}

impl From<Backup> for BackupResponse {
    fn from(backup: Backup) -> Self {
        Self {
            id: backup.id,
            instance_id: backup.instance_id,
            description: backup.description,
            state: backup.state,
            kept_until: backup.kept_until.map(|value| value.to_rfc3339()),
            created_at: backup.created_at.to_rfc3339(),
        }
    }
}
