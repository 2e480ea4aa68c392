use std::str::FromStr;

use nodeconductor_core::AppError;
use serde::{Deserialize, Serialize};

/// Backend tasks queued after a state change and executed by workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskName {
    /// Create the VM on the backend.
    ProvisionInstance,
    /// Power on.
    StartInstance,
    /// Power off.
    StopInstance,
    /// Remove the VM.
    DeleteInstance,
    /// Apply a new flavor.
    UpdateInstanceFlavor,
    /// Grow the data volume.
    ExtendInstanceDisk,
    /// Push attached security groups to the VM.
    PushInstanceSecurityGroups,
    /// Refresh flavors and images of a cloud account.
    SyncCloudAccount,
    /// Create or refresh the backend tenant of a membership.
    SyncCloudMembership,
    /// Push a public key to every reachable tenant.
    PushSshPublicKeys,
    /// Take a snapshot of an instance.
    ProcessBackup,
    /// Restore a snapshot onto its instance.
    RestoreBackup,
    /// Remove a snapshot.
    DeleteBackup,
}

impl TaskName {
    /// Every task known to workers.
    pub const ALL: [Self; 13] = [
        Self::ProvisionInstance,
        Self::StartInstance,
        Self::StopInstance,
        Self::DeleteInstance,
        Self::UpdateInstanceFlavor,
        Self::ExtendInstanceDisk,
        Self::PushInstanceSecurityGroups,
        Self::SyncCloudAccount,
        Self::SyncCloudMembership,
        Self::PushSshPublicKeys,
        Self::ProcessBackup,
        Self::RestoreBackup,
        Self::DeleteBackup,
    ];

    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProvisionInstance => "provision_instance",
            Self::StartInstance => "start_instance",
            Self::StopInstance => "stop_instance",
            Self::DeleteInstance => "delete_instance",
            Self::UpdateInstanceFlavor => "update_instance_flavor",
            Self::ExtendInstanceDisk => "extend_instance_disk",
            Self::PushInstanceSecurityGroups => "push_instance_security_groups",
            Self::SyncCloudAccount => "sync_cloud_account",
            Self::SyncCloudMembership => "sync_cloud_membership",
            Self::PushSshPublicKeys => "push_ssh_public_keys",
            Self::ProcessBackup => "process_backup",
            Self::RestoreBackup => "restore_backup",
            Self::DeleteBackup => "delete_backup",
        }
    }
}

impl FromStr for TaskName {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|task| task.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("unknown task '{value}'")))
    }
}
