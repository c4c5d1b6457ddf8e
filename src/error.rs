//! Error taxonomy for plans, transitions and progress reporting

use thiserror::Error;

use crate::state::Stage;

/// A workout could not be turned into a runnable plan
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("workout has no steps")]
    Empty,
    #[error("step {index} has non-positive duration {duration_seconds}s")]
    NonPositiveDuration { index: usize, duration_seconds: i64 },
    #[error("workout contains only rest steps")]
    AllRest,
}

/// The state machine was asked to do something its current stage does not allow.
///
/// Fatal to the session: the machine either refuses without mutating (terminal
/// stages) or moves to [`Stage::Error`] (live stages).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("illegal transition: {event} while {stage}")]
    IllegalTransition { stage: Stage, event: &'static str },
    #[error("session invariant violated: {reason}")]
    InvariantViolation { reason: String },
}

/// The completion/progress reporting collaborator failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordingFailure {
    #[error("backend unreachable: {0}")]
    Transport(String),
    #[error("backend rejected report with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Host-level errors for operations on the active session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no workout session loaded")]
    NoSession,
    #[error("session cannot be started from stage {stage}")]
    NotStartable { stage: Stage },
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("failed to lock session: {0}")]
    LockPoisoned(String),
}
