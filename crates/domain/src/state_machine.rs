use std::fmt::Debug;
use std::str::FromStr;

use nodeconductor_core::AppError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Entity types driven by a transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatefulKind {
    /// VM instances.
    Instance,
    /// Instance backups.
    Backup,
}

impl StatefulKind {
    /// Returns a stable storage value for this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Instance => "instance",
            Self::Backup => "backup",
        }
    }
}

impl FromStr for StatefulKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "instance" => Ok(Self::Instance),
            "backup" => Ok(Self::Backup),
            _ => Err(AppError::Validation(format!(
                "unknown stateful entity type '{value}'"
            ))),
        }
    }
}

/// One named edge of a transition table.
#[derive(Debug, Clone, Copy)]
pub struct Transition<S: 'static> {
    /// Transition name used by callers.
    pub name: &'static str,
    /// States the transition may start from.
    pub sources: &'static [S],
    /// Resulting state.
    pub target: S,
}

/// Finite state enum with a static transition table.
pub trait StateMachine: Copy + Eq + Debug + Send + Sync + 'static {
    /// Entity type the machine belongs to.
    const KIND: StatefulKind;

    /// Declared transitions.
    const TRANSITIONS: &'static [Transition<Self>];

    /// Returns a stable storage value for the state.
    fn as_str(&self) -> &'static str;

    /// Parses a stored state value.
    fn parse(value: &str) -> Result<Self, AppError>;
}

/// Reason a transition was rejected before any mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionRejection {
    /// The machine declares no transition with that name.
    UnknownTransition,
    /// The current state is not in the transition's source set.
    SourceStateNotAllowed,
}

/// Resolves the target state of `transition_name` from `current`.
pub fn next_state<S: StateMachine>(
    current: S,
    transition_name: &str,
) -> Result<S, TransitionRejection> {
    let transition = S::TRANSITIONS
        .iter()
        .find(|transition| transition.name == transition_name)
        .ok_or(TransitionRejection::UnknownTransition)?;

    if transition.sources.contains(&current) {
        Ok(transition.target)
    } else {
        Err(TransitionRejection::SourceStateNotAllowed)
    }
}

/// Field changes persisted together with a state change.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionEffect {
    /// Only the state column changes.
    None,
    /// Instance receives the hardware of a new flavor.
    InstanceFlavor {
        /// New flavor.
        flavor_id: Uuid,
        /// CPU cores of the flavor.
        cores: i32,
        /// Memory of the flavor in MiB.
        ram: i32,
    },
    /// Instance data volume grows to a new size in MiB.
    InstanceDataVolume {
        /// New data volume size.
        size: i32,
    },
    /// Instance went online; records the start time.
    InstanceStarted,
    /// Backup stores strategy metadata returned by the backend.
    BackupMetadata(Value),
}

#[cfg(test)]
mod tests {
    use nodeconductor_core::AppError;

    use super::{StateMachine, StatefulKind, Transition, TransitionRejection, next_state};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Door {
        Open,
        Closed,
    }

    impl StateMachine for Door {
        const KIND: StatefulKind = StatefulKind::Instance;
        const TRANSITIONS: &'static [Transition<Self>] = &[
            Transition {
                name: "close",
                sources: &[Door::Open],
                target: Door::Closed,
            },
            Transition {
                name: "open",
                sources: &[Door::Closed],
                target: Door::Open,
            },
        ];

        fn as_str(&self) -> &'static str {
            match self {
                Self::Open => "open",
                Self::Closed => "closed",
            }
        }

        fn parse(value: &str) -> Result<Self, AppError> {
            match value {
                "open" => Ok(Self::Open),
                "closed" => Ok(Self::Closed),
                _ => Err(AppError::Validation(value.to_owned())),
            }
        }
    }

    #[test]
    fn declared_edge_resolves_target() {
        assert_eq!(next_state(Door::Open, "close"), Ok(Door::Closed));
    }

    #[test]
    fn wrong_source_is_rejected() {
        assert_eq!(
            next_state(Door::Closed, "close"),
            Err(TransitionRejection::SourceStateNotAllowed)
        );
    }

    #[test]
    fn unknown_name_is_rejected() {
        assert_eq!(
            next_state(Door::Closed, "slam"),
            Err(TransitionRejection::UnknownTransition)
        );
    }
}
