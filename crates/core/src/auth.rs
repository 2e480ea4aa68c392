use serde::{Deserialize, Serialize};

use crate::UserId;

/// User information persisted in the authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    user_id: UserId,
    username: String,
    full_name: String,
    is_staff: bool,
}

impl UserIdentity {
    /// Creates a user identity from stored account data.
    #[must_use]
    pub fn new(
        user_id: UserId,
        username: impl Into<String>,
        full_name: impl Into<String>,
        is_staff: bool,
    ) -> Self {
        Self {
            user_id,
            username: username.into(),
            full_name: full_name.into(),
            is_staff,
        }
    }

    /// Returns the stable user identifier.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the login name.
    #[must_use]
    pub fn username(&self) -> &str {
        self.username.as_str()
    }

    /// Returns the display name.
    #[must_use]
    pub fn full_name(&self) -> &str {
        self.full_name.as_str()
    }

    /// Returns whether the user bypasses role scoping.
    #[must_use]
    pub fn is_staff(&self) -> bool {
        self.is_staff
    }
}
