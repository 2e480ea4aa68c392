//! PostgreSQL-backed instance backups.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nodeconductor_application::{BackupRepository, NewTask};
use nodeconductor_core::{AppError, AppResult};
use nodeconductor_domain::{Backup, BackupState, StateMachine, VisibleIds};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::postgres_errors::reference_conflict_or_internal;
use crate::postgres_task_queue_repository::insert_task;

/// PostgreSQL implementation of the backup repository port.
#[derive(Clone)]
pub struct PostgresBackupRepository {
    pool: PgPool,
}

impl PostgresBackupRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct BackupRow {
    id: Uuid,
    instance_id: Uuid,
    description: Option<String>,
    state: String,
    metadata: Option<Value>,
    kept_until: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<BackupRow> for Backup {
    type Error = AppError;

    fn try_from(row: BackupRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            instance_id: row.instance_id,
            description: row.description,
            state: BackupState::from_str(row.state.as_str())?,
            metadata: row.metadata,
            kept_until: row.kept_until,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl BackupRepository for PostgresBackupRepository {
    async fn list_backups(&self, visible_instances: &VisibleIds) -> AppResult<Vec<Backup>> {
        let rows = sqlx::query_as::<_, BackupRow>(
            r#"
            SELECT id, instance_id, description, state, metadata, kept_until, created_at
            FROM backups
            WHERE ($1::UUID[] IS NULL OR instance_id = ANY($1))
            ORDER BY created_at DESC, id ASC
            "#,
        )
        .bind(visible_instances.to_bind())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list backups: {error}")))?;

        rows.into_iter().map(Backup::try_from).collect()
    }

    async fn find_backup(&self, backup_id: Uuid) -> AppResult<Option<Backup>> {
        let row = sqlx::query_as::<_, BackupRow>(
            r#"
            SELECT id, instance_id, description, state, metadata, kept_until, created_at
            FROM backups
            WHERE id = $1
            "#,
        )
        .bind(backup_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find backup '{backup_id}': {error}"))
        })?;

        row.map(Backup::try_from).transpose()
    }

    async fn create_backup(&self, backup: Backup, task: NewTask) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to start backup create transaction: {error}"))
        })?;

        sqlx::query(
            r#"
            INSERT INTO backups (id, instance_id, description, state, version, metadata, kept_until, created_at)
            VALUES ($1, $2, $3, $4, 1, $5, $6, $7)
            "#,
        )
        .bind(backup.id)
        .bind(backup.instance_id)
        .bind(backup.description.as_deref())
        .bind(backup.state.as_str())
        .bind(backup.metadata.as_ref())
        .bind(backup.kept_until)
        .bind(backup.created_at)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            reference_conflict_or_internal(error, "backed up instance does not exist", "create backup")
        })?;

        insert_task(&mut *transaction, &task).await?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit backup create transaction: {error}"))
        })?;

        Ok(())
    }
}
