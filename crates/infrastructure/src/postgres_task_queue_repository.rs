//! PostgreSQL-backed task queue with leased claims.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nodeconductor_application::{ClaimedTask, NewTask, TaskQueueRepository, WorkerHeartbeatInput};
use nodeconductor_core::{AppError, AppResult};
use nodeconductor_domain::TaskName;
use serde_json::Value;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

/// PostgreSQL implementation of the task queue port.
#[derive(Clone)]
pub struct PostgresTaskQueueRepository {
    pool: PgPool,
}

impl PostgresTaskQueueRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ClaimedTaskRow {
    job_id: Uuid,
    task_name: String,
    entity_id: Uuid,
    payload: Value,
    attempts: i32,
    lease_token: String,
    lease_expires_at: DateTime<Utc>,
}

impl TryFrom<ClaimedTaskRow> for ClaimedTask {
    type Error = AppError;

    fn try_from(row: ClaimedTaskRow) -> Result<Self, Self::Error> {
        Ok(Self {
            job_id: row.job_id,
            task: TaskName::from_str(row.task_name.as_str())?,
            entity_id: row.entity_id,
            payload: row.payload,
            attempt: row.attempts,
            lease_token: row.lease_token,
            leased_until: row.lease_expires_at,
        })
    }
}

/// Inserts a pending task on the given connection.
///
/// Callers pass their open transaction so the task commits together with the
/// row change that caused it.
pub(crate) async fn insert_task(connection: &mut PgConnection, task: &NewTask) -> AppResult<Uuid> {
    sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO task_queue_jobs (task_name, entity_id, payload, status, created_at, updated_at)
        VALUES ($1, $2, $3, 'pending', now(), now())
        RETURNING id
        "#,
    )
    .bind(task.task.as_str())
    .bind(task.entity_id)
    .bind(&task.payload)
    .fetch_one(connection)
    .await
    .map_err(|error| {
        AppError::Internal(format!(
            "failed to enqueue task '{}' for entity '{}': {error}",
            task.task.as_str(),
            task.entity_id
        ))
    })
}

#[async_trait]
impl TaskQueueRepository for PostgresTaskQueueRepository {
    async fn enqueue(&self, task: NewTask) -> AppResult<Uuid> {
        let mut connection = self.pool.acquire().await.map_err(|error| {
            AppError::Internal(format!("failed to acquire task queue connection: {error}"))
        })?;
        insert_task(&mut *connection, &task).await
    }

    async fn claim_tasks(
        &self,
        worker_id: &str,
        limit: usize,
        lease_seconds: u32,
    ) -> AppResult<Vec<ClaimedTask>> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to start task claim transaction: {error}"))
        })?;

        let rows = sqlx::query_as::<_, ClaimedTaskRow>(
            r#"
            WITH candidate_jobs AS (
                SELECT id
                FROM task_queue_jobs
                WHERE status = 'pending'
                   OR (status = 'leased' AND lease_expires_at < now())
                ORDER BY created_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE task_queue_jobs jobs
            SET
                status = 'leased',
                attempts = jobs.attempts + 1,
                leased_by = $2,
                lease_token = gen_random_uuid()::TEXT,
                lease_expires_at = now() + make_interval(secs => $3::INT),
                updated_at = now()
            FROM candidate_jobs
            WHERE jobs.id = candidate_jobs.id
            RETURNING
                jobs.id AS job_id,
                jobs.task_name,
                jobs.entity_id,
                jobs.payload,
                jobs.attempts,
                jobs.lease_token,
                jobs.lease_expires_at
            "#,
        )
        .bind(i64::try_from(limit).map_err(|error| {
            AppError::Validation(format!("invalid task claim limit: {error}"))
        })?)
        .bind(worker_id)
        .bind(i32::try_from(lease_seconds).map_err(|error| {
            AppError::Validation(format!("invalid task lease_seconds: {error}"))
        })?)
        .fetch_all(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to claim tasks for worker '{worker_id}': {error}"
            ))
        })?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit task claim transaction: {error}"))
        })?;

        rows.into_iter().map(ClaimedTask::try_from).collect()
    }

    async fn complete_task(
        &self,
        job_id: Uuid,
        worker_id: &str,
        lease_token: &str,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE task_queue_jobs
            SET
                status = 'completed',
                leased_by = NULL,
                lease_token = NULL,
                lease_expires_at = NULL,
                last_error = NULL,
                updated_at = now()
            WHERE id = $1
              AND leased_by = $2
              AND lease_token = $3
              AND status = 'leased'
            "#,
        )
        .bind(job_id)
        .bind(worker_id)
        .bind(lease_token)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to complete task '{job_id}' for worker '{worker_id}': {error}"
            ))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "task '{job_id}' is not currently leased by worker '{worker_id}' with matching lease token"
            )));
        }

        Ok(())
    }

    async fn fail_task(
        &self,
        job_id: Uuid,
        worker_id: &str,
        lease_token: &str,
        error_message: &str,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE task_queue_jobs
            SET
                status = 'failed',
                leased_by = NULL,
                lease_token = NULL,
                lease_expires_at = NULL,
                last_error = $4,
                updated_at = now()
            WHERE id = $1
              AND leased_by = $2
              AND lease_token = $3
              AND status = 'leased'
            "#,
        )
        .bind(job_id)
        .bind(worker_id)
        .bind(lease_token)
        .bind(error_message)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to mark task '{job_id}' as failed for worker '{worker_id}': {error}"
            ))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "task '{job_id}' is not currently leased by worker '{worker_id}' with matching lease token"
            )));
        }

        Ok(())
    }

    async fn upsert_worker_heartbeat(
        &self,
        worker_id: &str,
        input: WorkerHeartbeatInput,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO task_worker_heartbeats (
                worker_id,
                last_seen_at,
                last_claimed_tasks,
                last_executed_tasks,
                last_failed_tasks,
                updated_at
            )
            VALUES ($1, now(), $2, $3, $4, now())
            ON CONFLICT (worker_id)
            DO UPDATE SET
                last_seen_at = now(),
                last_claimed_tasks = EXCLUDED.last_claimed_tasks,
                last_executed_tasks = EXCLUDED.last_executed_tasks,
                last_failed_tasks = EXCLUDED.last_failed_tasks,
                updated_at = now()
            "#,
        )
        .bind(worker_id)
        .bind(i64::from(input.claimed_tasks))
        .bind(i64::from(input.executed_tasks))
        .bind(i64::from(input.failed_tasks))
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to upsert worker heartbeat for '{worker_id}': {error}"
            ))
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use nodeconductor_application::{NewTask, TaskQueueRepository};
    use nodeconductor_core::AppError;
    use nodeconductor_domain::TaskName;
    use uuid::Uuid;

    use super::PostgresTaskQueueRepository;
    use crate::postgres_test_support::test_pool;

    #[tokio::test]
    async fn claimed_task_is_leased_once_and_completes_with_token() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let repository = PostgresTaskQueueRepository::new(pool);
        let entity_id = Uuid::new_v4();
        let enqueued = repository
            .enqueue(NewTask::new(TaskName::SyncCloudAccount, entity_id))
            .await;
        assert!(enqueued.is_ok());

        let first = repository
            .claim_tasks("worker-a", 100, 60)
            .await
            .unwrap_or_default();
        let Some(task) = first.into_iter().find(|task| task.entity_id == entity_id) else {
            panic!("enqueued task must be claimable");
        };
        assert_eq!(task.task, TaskName::SyncCloudAccount);
        assert_eq!(task.attempt, 1);

        let second = repository
            .claim_tasks("worker-b", 100, 60)
            .await
            .unwrap_or_default();
        assert!(second.iter().all(|claimed| claimed.job_id != task.job_id));

        let wrong_token = repository
            .complete_task(task.job_id, "worker-a", "not-the-token")
            .await;
        assert!(matches!(wrong_token, Err(AppError::Conflict(_))));

        let completed = repository
            .complete_task(task.job_id, "worker-a", task.lease_token.as_str())
            .await;
        assert!(completed.is_ok());
    }
}
