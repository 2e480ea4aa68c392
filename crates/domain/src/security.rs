use serde::{Deserialize, Serialize};

/// Stable audit actions emitted by application use-cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A stateful entity changed state through the executor.
    EntityStateTransitioned,
    /// A structure role was granted.
    RoleGranted,
    /// A structure role was revoked.
    RoleRevoked,
    /// A customer was created.
    CustomerCreated,
    /// A project group was created.
    ProjectGroupCreated,
    /// A project was created.
    ProjectCreated,
    /// A cloud account was registered.
    CloudCreated,
    /// A cloud was linked to a project.
    MembershipCreated,
    /// An instance was requested.
    InstanceCreated,
    /// A backup was requested.
    BackupCreated,
    /// An SSH public key was uploaded.
    SshKeyCreated,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EntityStateTransitioned => "entity.state.transitioned",
            Self::RoleGranted => "structure.role.granted",
            Self::RoleRevoked => "structure.role.revoked",
            Self::CustomerCreated => "structure.customer.created",
            Self::ProjectGroupCreated => "structure.project_group.created",
            Self::ProjectCreated => "structure.project.created",
            Self::CloudCreated => "iaas.cloud.created",
            Self::MembershipCreated => "iaas.membership.created",
            Self::InstanceCreated => "iaas.instance.created",
            Self::BackupCreated => "backup.created",
            Self::SshKeyCreated => "iaas.ssh_key.created",
        }
    }
}
