//! User ports and authentication service.
//!
//! User management is outside the API surface; accounts come from the
//! bootstrap staff user or direct database provisioning.

use std::sync::Arc;

use async_trait::async_trait;
use nodeconductor_core::{AppError, AppResult, NonEmptyString, UserId, UserIdentity};
use tracing::info;

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// User record returned by repository queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Unique user identifier.
    pub id: UserId,
    /// Login name.
    pub username: String,
    /// Display name.
    pub full_name: String,
    /// Argon2id password hash.
    pub password_hash: String,
    /// Staff users bypass role scoping.
    pub is_staff: bool,
}

impl UserRecord {
    /// Returns the session identity of this user.
    #[must_use]
    pub fn identity(&self) -> UserIdentity {
        UserIdentity::new(
            self.id,
            self.username.clone(),
            self.full_name.clone(),
            self.is_staff,
        )
    }
}

/// Repository port for user persistence.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Finds a user by login name (case-insensitive).
    async fn find_by_username(&self, username: &str) -> AppResult<Option<UserRecord>>;

    /// Finds a user by identifier.
    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<UserRecord>>;

    /// Inserts a user; duplicate usernames fail with `Conflict`.
    async fn create(&self, user: UserRecord) -> AppResult<()>;
}

/// Port for password hashing operations.
pub trait PasswordHasher: Send + Sync {
    /// Hashes a plaintext password using Argon2id.
    fn hash_password(&self, password: &str) -> AppResult<String>;

    /// Verifies a plaintext password against a stored hash.
    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool>;
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Application service for password authentication.
#[derive(Clone)]
pub struct UserService {
    user_repository: Arc<dyn UserRepository>,
    password_hasher: Arc<dyn PasswordHasher>,
}

impl UserService {
    /// Creates a new user service.
    #[must_use]
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        password_hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        Self {
            user_repository,
            password_hasher,
        }
    }

    /// Authenticates a user and returns the session identity.
    ///
    /// Unknown users and wrong passwords fail with the same message.
    pub async fn login(&self, username: &str, password: &str) -> AppResult<UserIdentity> {
        let Some(user) = self.user_repository.find_by_username(username).await? else {
            let _ = self.password_hasher.hash_password(password);
            return Err(invalid_credentials());
        };

        if !self
            .password_hasher
            .verify_password(password, user.password_hash.as_str())?
        {
            return Err(invalid_credentials());
        }

        Ok(user.identity())
    }

    /// Returns the current identity of an existing user.
    pub async fn find_identity(&self, user_id: UserId) -> AppResult<Option<UserIdentity>> {
        Ok(self
            .user_repository
            .find_by_id(user_id)
            .await?
            .map(|user| user.identity()))
    }

    /// Creates the staff account unless the username is taken.
    pub async fn ensure_staff_user(&self, username: &str, password: &str) -> AppResult<()> {
        let username = NonEmptyString::new(username.trim())?;
        if password.len() < 8 {
            return Err(AppError::Validation(
                "bootstrap staff password must be at least 8 characters".to_owned(),
            ));
        }

        if self
            .user_repository
            .find_by_username(username.as_str())
            .await?
            .is_some()
        {
            return Ok(());
        }

        self.user_repository
            .create(UserRecord {
                id: UserId::new(),
                username: username.as_str().to_owned(),
                full_name: username.as_str().to_owned(),
                password_hash: self.password_hasher.hash_password(password)?,
                is_staff: true,
            })
            .await?;

        info!(username = %username, "bootstrap staff user created");
        Ok(())
    }
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("invalid username or password".to_owned())
}
