use std::str::FromStr;

use nodeconductor_core::AppError;
use serde::{Deserialize, Serialize};

use crate::structure::ScopeLevel;

/// Entity types whose visibility is derived from the role hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Customers.
    Customer,
    /// Project groups.
    ProjectGroup,
    /// Projects.
    Project,
    /// Cloud accounts.
    Cloud,
    /// Flavors offered by a cloud.
    Flavor,
    /// Links between a cloud and a project.
    CloudProjectMembership,
    /// VM instances.
    Instance,
    /// Security groups of a membership.
    SecurityGroup,
    /// Instance backups.
    Backup,
}

impl EntityKind {
    /// Returns a stable transport value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::ProjectGroup => "project_group",
            Self::Project => "project",
            Self::Cloud => "cloud",
            Self::Flavor => "flavor",
            Self::CloudProjectMembership => "cloud_project_membership",
            Self::Instance => "instance",
            Self::SecurityGroup => "security_group",
            Self::Backup => "backup",
        }
    }

    /// Returns all scoped entity kinds.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[EntityKind] = &[
            EntityKind::Customer,
            EntityKind::ProjectGroup,
            EntityKind::Project,
            EntityKind::Cloud,
            EntityKind::Flavor,
            EntityKind::CloudProjectMembership,
            EntityKind::Instance,
            EntityKind::SecurityGroup,
            EntityKind::Backup,
        ];

        ALL
    }
}

impl FromStr for EntityKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("unknown entity type '{value}'")))
    }
}

impl From<ScopeLevel> for EntityKind {
    fn from(level: ScopeLevel) -> Self {
        match level {
            ScopeLevel::Customer => Self::Customer,
            ScopeLevel::ProjectGroup => Self::ProjectGroup,
            ScopeLevel::Project => Self::Project,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::EntityKind;

    #[test]
    fn every_kind_parses_its_transport_value() {
        for kind in EntityKind::all() {
            assert_eq!(EntityKind::from_str(kind.as_str()).ok(), Some(*kind));
        }
    }
}
