//! Versioned compare-and-write of instance and backup states.
//!
//! A write succeeds only when the row still holds the state and version the
//! executor observed. The field changes of the transition and its follow-up
//! task commit in the same transaction as the state itself, so a worker can
//! never see a task whose state change was rolled back.

use async_trait::async_trait;
use nodeconductor_application::{StateSnapshot, StateWrite, StatefulRepository};
use nodeconductor_core::{AppError, AppResult};
use nodeconductor_domain::{StatefulKind, TransitionEffect};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::postgres_task_queue_repository::insert_task;

/// PostgreSQL implementation of the stateful repository port.
#[derive(Clone)]
pub struct PostgresStateRepository {
    pool: PgPool,
}

impl PostgresStateRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct StateRow {
    state: String,
    version: i64,
}

fn table_of(kind: StatefulKind) -> &'static str {
    match kind {
        StatefulKind::Instance => "instances",
        StatefulKind::Backup => "backups",
    }
}

#[async_trait]
impl StatefulRepository for PostgresStateRepository {
    async fn load_state(&self, kind: StatefulKind, id: Uuid) -> AppResult<Option<StateSnapshot>> {
        let statement = format!("SELECT state, version FROM {} WHERE id = $1", table_of(kind));

        let row = sqlx::query_as::<_, StateRow>(statement.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to load state of {} '{id}': {error}",
                    kind.as_str()
                ))
            })?;

        Ok(row.map(|row| StateSnapshot {
            state: row.state,
            version: row.version,
        }))
    }

    async fn compare_and_write(&self, write: StateWrite) -> AppResult<bool> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to start state write transaction: {error}"))
        })?;

        let result = match (write.kind, &write.effect) {
            (StatefulKind::Instance, TransitionEffect::BackupMetadata(_)) => {
                return Err(AppError::Internal(
                    "backup metadata cannot be written to an instance".to_owned(),
                ));
            }
            (StatefulKind::Instance, effect) => {
                let (flavor_id, cores, ram, data_volume_size) = match effect {
                    TransitionEffect::InstanceFlavor {
                        flavor_id,
                        cores,
                        ram,
                    } => (Some(*flavor_id), Some(*cores), Some(*ram), None),
                    TransitionEffect::InstanceDataVolume { size } => {
                        (None, None, None, Some(*size))
                    }
                    _ => (None, None, None, None),
                };

                sqlx::query(
                    r#"
                    UPDATE instances
                    SET
                        state = $4,
                        version = version + 1,
                        flavor_id = COALESCE($5, flavor_id),
                        cores = COALESCE($6, cores),
                        ram = COALESCE($7, ram),
                        data_volume_size = COALESCE($8, data_volume_size),
                        start_time = CASE WHEN $9 THEN now() ELSE start_time END
                    WHERE id = $1 AND state = $2 AND version = $3
                    "#,
                )
                .bind(write.id)
                .bind(write.expected_state.as_str())
                .bind(write.expected_version)
                .bind(write.target_state)
                .bind(flavor_id)
                .bind(cores)
                .bind(ram)
                .bind(data_volume_size)
                .bind(matches!(effect, TransitionEffect::InstanceStarted))
                .execute(&mut *transaction)
                .await
            }
            (StatefulKind::Backup, TransitionEffect::None) => {
                sqlx::query(
                    r#"
                    UPDATE backups
                    SET state = $4, version = version + 1
                    WHERE id = $1 AND state = $2 AND version = $3
                    "#,
                )
                .bind(write.id)
                .bind(write.expected_state.as_str())
                .bind(write.expected_version)
                .bind(write.target_state)
                .execute(&mut *transaction)
                .await
            }
            (StatefulKind::Backup, TransitionEffect::BackupMetadata(metadata)) => {
                sqlx::query(
                    r#"
                    UPDATE backups
                    SET state = $4, version = version + 1, metadata = $5
                    WHERE id = $1 AND state = $2 AND version = $3
                    "#,
                )
                .bind(write.id)
                .bind(write.expected_state.as_str())
                .bind(write.expected_version)
                .bind(write.target_state)
                .bind(metadata)
                .execute(&mut *transaction)
                .await
            }
            (StatefulKind::Backup, _) => {
                return Err(AppError::Internal(
                    "instance fields cannot be written to a backup".to_owned(),
                ));
            }
        }
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to write state of {} '{}': {error}",
                write.kind.as_str(),
                write.id
            ))
        })?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        if let Some(task) = &write.follow_up {
            insert_task(&mut *transaction, task).await?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit state write transaction: {error}"))
        })?;

        Ok(true)
    }
}
