use std::str::FromStr;

use chrono::{DateTime, Utc};
use nodeconductor_core::{AppError, AppResult, NonEmptyString, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Top-level tenant owning projects, project groups and clouds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    /// Stable identifier.
    pub id: Uuid,
    /// Display name.
    pub name: NonEmptyString,
    /// Name in the customer's native language.
    pub native_name: Option<String>,
    /// Short code used in listings.
    pub abbreviation: Option<String>,
    /// Free-form contact details.
    pub contact_details: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Grouping of projects for delegated management.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectGroup {
    /// Stable identifier.
    pub id: Uuid,
    /// Owning customer.
    pub customer_id: Uuid,
    /// Display name.
    pub name: NonEmptyString,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Unit owning compute instances, scoped under one customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Stable identifier.
    pub id: Uuid,
    /// Owning customer.
    pub customer_id: Uuid,
    /// Display name.
    pub name: NonEmptyString,
    /// Optional description.
    pub description: Option<String>,
    /// Groups the project currently belongs to.
    pub project_group_ids: Vec<Uuid>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Hierarchy level a role assignment is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeLevel {
    /// Assignment on a customer.
    Customer,
    /// Assignment on a project group.
    ProjectGroup,
    /// Assignment on a project.
    Project,
}

impl ScopeLevel {
    /// Returns a stable storage value for this level.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::ProjectGroup => "project_group",
            Self::Project => "project",
        }
    }

    /// Returns whether `role` may be granted at this level.
    #[must_use]
    pub fn allows(&self, role: Role) -> bool {
        matches!(
            (self, role),
            (Self::Customer, Role::Owner)
                | (Self::ProjectGroup, Role::Manager)
                | (Self::Project, Role::Administrator)
                | (Self::Project, Role::Manager)
        )
    }
}

impl FromStr for ScopeLevel {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "customer" => Ok(Self::Customer),
            "project_group" => Ok(Self::ProjectGroup),
            "project" => Ok(Self::Project),
            _ => Err(AppError::Validation(format!(
                "unknown scope level '{value}'"
            ))),
        }
    }
}

/// Roles grantable on the structure hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Customer owner.
    Owner,
    /// Project-group or project manager.
    Manager,
    /// Project administrator.
    Administrator,
}

impl Role {
    /// Returns a stable storage value for this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Manager => "manager",
            Self::Administrator => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "owner" => Ok(Self::Owner),
            "manager" => Ok(Self::Manager),
            "admin" | "administrator" => Ok(Self::Administrator),
            _ => Err(AppError::Validation(format!("unknown role '{value}'"))),
        }
    }
}

/// Grant of a role to a user at one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// Stable assignment identifier.
    pub id: Uuid,
    /// Grantee.
    pub user_id: UserId,
    /// Level of the scope entity.
    pub level: ScopeLevel,
    /// Customer, project group or project identifier.
    pub scope_id: Uuid,
    /// Granted role.
    pub role: Role,
}

impl RoleAssignment {
    /// Creates a validated assignment with a fresh identifier.
    pub fn new(user_id: UserId, level: ScopeLevel, scope_id: Uuid, role: Role) -> AppResult<Self> {
        if !level.allows(role) {
            return Err(AppError::Validation(format!(
                "role '{}' cannot be granted on a {}",
                role.as_str(),
                level.as_str()
            )));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            level,
            scope_id,
            role,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use nodeconductor_core::UserId;
    use uuid::Uuid;

    use super::{Role, RoleAssignment, ScopeLevel};

    #[test]
    fn customer_level_only_accepts_owner() {
        assert!(ScopeLevel::Customer.allows(Role::Owner));
        assert!(!ScopeLevel::Customer.allows(Role::Manager));
        assert!(!ScopeLevel::Customer.allows(Role::Administrator));
    }

    #[test]
    fn project_level_accepts_admin_and_manager() {
        let user_id = UserId::new();
        let project_id = Uuid::new_v4();

        assert!(
            RoleAssignment::new(user_id, ScopeLevel::Project, project_id, Role::Administrator)
                .is_ok()
        );
        assert!(
            RoleAssignment::new(user_id, ScopeLevel::Project, project_id, Role::Manager).is_ok()
        );
        assert!(
            RoleAssignment::new(user_id, ScopeLevel::Project, project_id, Role::Owner).is_err()
        );
    }

    #[test]
    fn role_parses_legacy_administrator_name() {
        assert_eq!(
            Role::from_str("administrator").unwrap_or(Role::Owner),
            Role::Administrator
        );
        assert!(Role::from_str("superuser").is_err());
    }
}
