//! PostgreSQL-backed SSH public keys.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nodeconductor_application::{NewTask, SshKeyRepository};
use nodeconductor_core::{AppError, AppResult, NonEmptyString, UserId};
use nodeconductor_domain::SshPublicKey;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::postgres_errors::unique_conflict_or_internal;
use crate::postgres_task_queue_repository::insert_task;

/// PostgreSQL implementation of the SSH key repository port.
#[derive(Clone)]
pub struct PostgresSshKeyRepository {
    pool: PgPool,
}

impl PostgresSshKeyRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct SshKeyRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    public_key: String,
    fingerprint: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<SshKeyRow> for SshPublicKey {
    type Error = AppError;

    fn try_from(row: SshKeyRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: UserId::from_uuid(row.user_id),
            name: NonEmptyString::new(row.name)?,
            public_key: row.public_key,
            fingerprint: row.fingerprint,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl SshKeyRepository for PostgresSshKeyRepository {
    async fn list_keys(&self, owner: Option<UserId>) -> AppResult<Vec<SshPublicKey>> {
        let rows = sqlx::query_as::<_, SshKeyRow>(
            r#"
            SELECT id, user_id, name, public_key, fingerprint, created_at
            FROM ssh_public_keys
            WHERE ($1::UUID IS NULL OR user_id = $1)
            ORDER BY name ASC, id ASC
            "#,
        )
        .bind(owner.map(|owner| owner.as_uuid()))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list ssh keys: {error}")))?;

        rows.into_iter().map(SshPublicKey::try_from).collect()
    }

    async fn find_key(&self, key_id: Uuid) -> AppResult<Option<SshPublicKey>> {
        let row = sqlx::query_as::<_, SshKeyRow>(
            r#"
            SELECT id, user_id, name, public_key, fingerprint, created_at
            FROM ssh_public_keys
            WHERE id = $1
            "#,
        )
        .bind(key_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find ssh key '{key_id}': {error}")))?;

        row.map(SshPublicKey::try_from).transpose()
    }

    async fn create_key(&self, key: SshPublicKey, task: NewTask) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to start ssh key create transaction: {error}"))
        })?;

        sqlx::query(
            r#"
            INSERT INTO ssh_public_keys (id, user_id, name, public_key, fingerprint, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(key.id)
        .bind(key.user_id.as_uuid())
        .bind(key.name.as_str())
        .bind(key.public_key.as_str())
        .bind(key.fingerprint.as_str())
        .bind(key.created_at)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            unique_conflict_or_internal(
                error,
                format!("ssh key named '{}' already exists", key.name.as_str()).as_str(),
                "create ssh key",
            )
        })?;

        insert_task(&mut *transaction, &task).await?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit ssh key create transaction: {error}"))
        })?;

        Ok(())
    }

    async fn delete_key(&self, key_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM ssh_public_keys WHERE id = $1")
            .bind(key_id)
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to delete ssh key '{key_id}': {error}"))
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("ssh key '{key_id}' not found")));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use nodeconductor_application::{NewTask, SshKeyRepository};
    use nodeconductor_core::{AppError, UserId};
    use nodeconductor_domain::{SshPublicKey, TaskName};

    use super::PostgresSshKeyRepository;
    use crate::postgres_test_support::{insert_user, test_pool};

    const KEY: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIOMqqnkVzrm0SdG6UOoqKLsabgH5C9okWi0dh2l9GKJl dev@host";

    #[tokio::test]
    async fn duplicate_key_name_per_owner_conflicts() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let repository = PostgresSshKeyRepository::new(pool.clone());
        let owner = UserId::from_uuid(insert_user(&pool, false).await);

        let Ok(first) = SshPublicKey::new(owner, "laptop", KEY) else {
            panic!("fixture key must parse");
        };
        let Ok(second) = SshPublicKey::new(owner, "laptop", KEY) else {
            panic!("fixture key must parse");
        };

        let created = repository
            .create_key(first.clone(), NewTask::new(TaskName::PushSshPublicKeys, first.id))
            .await;
        assert!(created.is_ok());

        let duplicate = repository
            .create_key(second.clone(), NewTask::new(TaskName::PushSshPublicKeys, second.id))
            .await;
        assert!(matches!(duplicate, Err(AppError::Conflict(_))));

        let listed = repository.list_keys(Some(owner)).await.unwrap_or_default();
        assert_eq!(listed.len(), 1);
    }
}
