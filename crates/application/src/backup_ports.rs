use async_trait::async_trait;
use nodeconductor_core::AppResult;
use nodeconductor_domain::{Backup, VisibleIds};
use uuid::Uuid;

use crate::NewTask;

/// Repository port for instance backups.
#[async_trait]
pub trait BackupRepository: Send + Sync {
    /// Lists backups whose source instance is visible.
    async fn list_backups(&self, visible_instances: &VisibleIds) -> AppResult<Vec<Backup>>;

    /// Returns one backup.
    async fn find_backup(&self, backup_id: Uuid) -> AppResult<Option<Backup>>;

    /// Inserts a backup and enqueues its processing in one transaction.
    async fn create_backup(&self, backup: Backup, task: NewTask) -> AppResult<()>;
}
