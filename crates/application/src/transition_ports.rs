use async_trait::async_trait;
use nodeconductor_core::AppResult;
use nodeconductor_domain::{StatefulKind, TransitionEffect};
use uuid::Uuid;

use crate::NewTask;

/// Current state of a stateful row with its optimistic-concurrency version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSnapshot {
    /// Stored state value.
    pub state: String,
    /// Row version, incremented on every state write.
    pub version: i64,
}

/// Compare-and-write request for one state change.
#[derive(Debug, Clone, PartialEq)]
pub struct StateWrite {
    /// Entity type.
    pub kind: StatefulKind,
    /// Entity identifier.
    pub id: Uuid,
    /// State observed before the transition.
    pub expected_state: String,
    /// Version observed before the transition.
    pub expected_version: i64,
    /// State to persist.
    pub target_state: &'static str,
    /// Field changes persisted with the state.
    pub effect: TransitionEffect,
    /// Task enqueued in the same transaction.
    pub follow_up: Option<NewTask>,
}

/// Storage port used by the state transition executor.
#[async_trait]
pub trait StatefulRepository: Send + Sync {
    /// Loads the state snapshot of one row.
    async fn load_state(&self, kind: StatefulKind, id: Uuid) -> AppResult<Option<StateSnapshot>>;

    /// Persists the target state only when the row still holds the expected
    /// state and version.
    ///
    /// Returns `false` when no row matched. The follow-up task, when present,
    /// is inserted in the same transaction as the state write.
    async fn compare_and_write(&self, write: StateWrite) -> AppResult<bool>;
}
