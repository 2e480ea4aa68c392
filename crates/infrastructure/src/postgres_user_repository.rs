//! PostgreSQL-backed user repository.

use async_trait::async_trait;
use sqlx::PgPool;

use nodeconductor_application::{UserRecord, UserRepository};
use nodeconductor_core::{AppError, AppResult, UserId};

use crate::postgres_errors::unique_conflict_or_internal;

/// PostgreSQL implementation of the user repository port.
#[derive(Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: uuid::Uuid,
    username: String,
    full_name: String,
    password_hash: String,
    is_staff: bool,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId::from_uuid(row.id),
            username: row.username,
            full_name: row.full_name,
            password_hash: row.password_hash,
            is_staff: row.is_staff,
        }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_by_username(&self, username: &str) -> AppResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, full_name, password_hash, is_staff
            FROM users
            WHERE lower(username) = lower($1)
            LIMIT 1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find user by username: {error}"))
        })?;

        Ok(row.map(UserRecord::from))
    }

    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, full_name, password_hash, is_staff
            FROM users
            WHERE id = $1
            LIMIT 1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find user by id: {error}")))?;

        Ok(row.map(UserRecord::from))
    }

    async fn create(&self, user: UserRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, full_name, password_hash, is_staff)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(user.username.as_str())
        .bind(user.full_name.as_str())
        .bind(user.password_hash.as_str())
        .bind(user.is_staff)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            unique_conflict_or_internal(
                error,
                &format!("username '{}' is already taken", user.username),
                "create user",
            )
        })?;

        Ok(())
    }
}
