use std::str::FromStr;

use chrono::{DateTime, Utc};
use nodeconductor_core::AppError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::state_machine::{StateMachine, StatefulKind, Transition};

/// Lifecycle states of a backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupState {
    /// Snapshot is being taken.
    BackingUp,
    /// Snapshot available.
    Ready,
    /// Snapshot is being restored onto its source.
    Restoring,
    /// Snapshot is being removed.
    Deleting,
    /// Snapshot removed.
    Deleted,
    /// Last backend operation failed.
    Erred,
}

impl StateMachine for BackupState {
    const KIND: StatefulKind = StatefulKind::Backup;
    const TRANSITIONS: &'static [Transition<Self>] = &[
        Transition {
            name: "confirm_backup",
            sources: &[BackupState::BackingUp],
            target: BackupState::Ready,
        },
        Transition {
            name: "start_restoration",
            sources: &[BackupState::Ready],
            target: BackupState::Restoring,
        },
        Transition {
            name: "confirm_restoration",
            sources: &[BackupState::Restoring],
            target: BackupState::Ready,
        },
        Transition {
            name: "start_deletion",
            sources: &[BackupState::Ready],
            target: BackupState::Deleting,
        },
        Transition {
            name: "confirm_deletion",
            sources: &[BackupState::Deleting],
            target: BackupState::Deleted,
        },
        Transition {
            name: "set_erred",
            sources: &[
                BackupState::BackingUp,
                BackupState::Restoring,
                BackupState::Deleting,
            ],
            target: BackupState::Erred,
        },
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Self::BackingUp => "backing_up",
            Self::Ready => "ready",
            Self::Restoring => "restoring",
            Self::Deleting => "deleting",
            Self::Deleted => "deleted",
            Self::Erred => "erred",
        }
    }

    fn parse(value: &str) -> Result<Self, AppError> {
        Self::from_str(value)
    }
}

impl FromStr for BackupState {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "backing_up" => Ok(Self::BackingUp),
            "ready" => Ok(Self::Ready),
            "restoring" => Ok(Self::Restoring),
            "deleting" => Ok(Self::Deleting),
            "deleted" => Ok(Self::Deleted),
            "erred" => Ok(Self::Erred),
            _ => Err(AppError::Validation(format!(
                "unknown backup state '{value}'"
            ))),
        }
    }
}

/// Named backup transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupTransition {
    /// Backend finished the snapshot.
    ConfirmBackup,
    /// User asked for a restore.
    StartRestoration,
    /// Backend finished the restore.
    ConfirmRestoration,
    /// User asked for removal.
    StartDeletion,
    /// Backend removed the snapshot.
    ConfirmDeletion,
    /// Backend reports a failure.
    SetErred,
}

impl BackupTransition {
    /// Returns the transition table name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfirmBackup => "confirm_backup",
            Self::StartRestoration => "start_restoration",
            Self::ConfirmRestoration => "confirm_restoration",
            Self::StartDeletion => "start_deletion",
            Self::ConfirmDeletion => "confirm_deletion",
            Self::SetErred => "set_erred",
        }
    }
}

/// Persisted backup of an instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backup {
    /// Stable identifier.
    pub id: Uuid,
    /// Instance the backup was taken from.
    pub instance_id: Uuid,
    /// Optional description.
    pub description: Option<String>,
    /// Lifecycle state.
    pub state: BackupState,
    /// Strategy metadata needed for restore and delete.
    pub metadata: Option<Value>,
    /// Retention deadline.
    pub kept_until: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::BackupState;
    use crate::state_machine::{TransitionRejection, next_state};

    #[test]
    fn restore_requires_ready_backup() {
        assert_eq!(
            next_state(BackupState::Ready, "start_restoration"),
            Ok(BackupState::Restoring)
        );
        assert_eq!(
            next_state(BackupState::BackingUp, "start_restoration"),
            Err(TransitionRejection::SourceStateNotAllowed)
        );
    }

    #[test]
    fn deleted_is_terminal() {
        for name in [
            "confirm_backup",
            "start_restoration",
            "confirm_restoration",
            "start_deletion",
            "confirm_deletion",
            "set_erred",
        ] {
            assert!(next_state(BackupState::Deleted, name).is_err(), "{name}");
        }
    }
}
