//! Atomic state transition executor.
//!
//! Every state change of an instance or backup goes through
//! [`StateTransitionExecutor::apply_transition`]: the current state is checked
//! against the machine's transition table and the target state is written
//! with compare-and-write on `(state, version)`, together with the follow-up
//! task, in one storage transaction.

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use nodeconductor_core::AppError;
use nodeconductor_domain::{
    AuditAction, StateMachine, StatefulKind, TransitionEffect, TransitionRejection, next_state,
};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{AuditEvent, AuditRepository, NewTask, StateWrite, StatefulRepository};

/// Why a transition did not happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChangeReason {
    /// The entity does not exist (anymore).
    NotFound,
    /// The transition is unknown or not allowed from the current state.
    TransitionNotAllowed {
        /// Stored state at the time of the attempt.
        current: String,
    },
    /// Another writer changed the row first, or the write failed.
    ConcurrentUpdate,
}

impl Display for StateChangeReason {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => formatter.write_str("entity not found"),
            Self::TransitionNotAllowed { current } => {
                write!(formatter, "transition not allowed from state '{current}'")
            }
            Self::ConcurrentUpdate => formatter.write_str("concurrent update"),
        }
    }
}

/// Unified failure of [`StateTransitionExecutor::apply_transition`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot apply '{transition}' to {kind_label} '{id}': {reason}", kind_label = .kind.as_str())]
pub struct StateChangeError {
    /// Entity type.
    pub kind: StatefulKind,
    /// Entity identifier.
    pub id: Uuid,
    /// Attempted transition.
    pub transition: String,
    /// Failure reason.
    pub reason: StateChangeReason,
}

impl From<StateChangeError> for AppError {
    fn from(error: StateChangeError) -> Self {
        AppError::Conflict(error.to_string())
    }
}

/// One transition to apply.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRequest {
    /// Entity identifier.
    pub id: Uuid,
    /// Transition name from the machine's table.
    pub transition: &'static str,
    /// Field changes persisted with the new state.
    pub effect: TransitionEffect,
    /// Task enqueued when the transition commits.
    pub follow_up: Option<NewTask>,
}

impl TransitionRequest {
    /// Creates a request without side effects.
    #[must_use]
    pub fn new(id: Uuid, transition: &'static str) -> Self {
        Self {
            id,
            transition,
            effect: TransitionEffect::None,
            follow_up: None,
        }
    }

    /// Sets the field changes.
    #[must_use]
    pub fn with_effect(mut self, effect: TransitionEffect) -> Self {
        self.effect = effect;
        self
    }

    /// Sets the follow-up task.
    #[must_use]
    pub fn with_follow_up(mut self, task: NewTask) -> Self {
        self.follow_up = Some(task);
        self
    }
}

/// Applies validated state transitions with optimistic concurrency.
#[derive(Clone)]
pub struct StateTransitionExecutor {
    repository: Arc<dyn StatefulRepository>,
    audit_repository: Arc<dyn AuditRepository>,
}

impl StateTransitionExecutor {
    /// Creates a new executor.
    #[must_use]
    pub fn new(
        repository: Arc<dyn StatefulRepository>,
        audit_repository: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            repository,
            audit_repository,
        }
    }

    /// Moves the entity to the transition's target state.
    ///
    /// Nothing is written unless the stored state is a declared source of the
    /// transition and the row was not modified since it was read. Failures are
    /// never retried.
    pub async fn apply_transition<S: StateMachine>(
        &self,
        subject: &str,
        request: TransitionRequest,
    ) -> Result<S, StateChangeError> {
        let TransitionRequest {
            id,
            transition,
            effect,
            follow_up,
        } = request;
        let fail = |reason: StateChangeReason| {
            let error = StateChangeError {
                kind: S::KIND,
                id,
                transition: transition.to_owned(),
                reason,
            };
            warn!(
                entity = S::KIND.as_str(),
                entity_id = %id,
                transition,
                reason = %error.reason,
                "state transition failed"
            );
            error
        };

        debug!(
            entity = S::KIND.as_str(),
            entity_id = %id,
            transition,
            "applying state transition"
        );

        let snapshot = match self.repository.load_state(S::KIND, id).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return Err(fail(StateChangeReason::NotFound)),
            Err(error) => {
                warn!(entity_id = %id, error = %error, "failed to load entity state");
                return Err(fail(StateChangeReason::ConcurrentUpdate));
            }
        };

        let not_allowed = || StateChangeReason::TransitionNotAllowed {
            current: snapshot.state.clone(),
        };
        let current = S::parse(snapshot.state.as_str()).map_err(|_| fail(not_allowed()))?;
        let target = next_state(current, transition).map_err(|rejection| {
            if rejection == TransitionRejection::UnknownTransition {
                debug!(transition, "transition is not declared");
            }
            fail(not_allowed())
        })?;

        let write = StateWrite {
            kind: S::KIND,
            id,
            expected_state: snapshot.state.clone(),
            expected_version: snapshot.version,
            target_state: target.as_str(),
            effect,
            follow_up,
        };

        match self.repository.compare_and_write(write).await {
            Ok(true) => {}
            Ok(false) => return Err(fail(StateChangeReason::ConcurrentUpdate)),
            Err(error) => {
                warn!(entity_id = %id, error = %error, "state write failed");
                return Err(fail(StateChangeReason::ConcurrentUpdate));
            }
        }

        info!(
            entity = S::KIND.as_str(),
            entity_id = %id,
            transition,
            from = snapshot.state.as_str(),
            to = target.as_str(),
            "state transition applied"
        );

        self.audit_repository
            .record(AuditEvent {
                subject: subject.to_owned(),
                action: AuditAction::EntityStateTransitioned,
                resource_type: S::KIND.as_str().to_owned(),
                resource_id: id,
                detail: Some(format!(
                    "{} {id} transitioned to {}",
                    S::KIND.as_str(),
                    target.as_str()
                )),
            })
            .await;

        Ok(target)
    }
}
