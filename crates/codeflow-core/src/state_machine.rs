//! Run state machine
//!
//! `Pending → Specify → Plan → Implement → Completed`, with `Error` reachable
//! from every non-terminal state. Forward-only; nothing leaves a terminal
//! state.

use crate::error::StateError;
use crate::types::{Phase, RequestStatus};
use serde::{Deserialize, Serialize};

/// State of one generation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Created, not started
    Pending,
    /// Specification phase
    Specify,
    /// Planning phase
    Plan,
    /// Implementation phase
    Implement,
    /// Delivered
    Completed,
    /// Failed
    Error,
}

impl RunState {
    /// Phase being generated, if any
    #[must_use]
    pub const fn phase(self) -> Option<Phase> {
        match self {
            Self::Specify => Some(Phase::Specify),
            Self::Plan => Some(Phase::Plan),
            Self::Implement => Some(Phase::Implement),
            Self::Pending | Self::Completed | Self::Error => None,
        }
    }

    /// Caller-facing status
    #[must_use]
    pub const fn status(self) -> RequestStatus {
        match self {
            Self::Pending => RequestStatus::Pending,
            Self::Specify | Self::Plan | Self::Implement => RequestStatus::InProgress,
            Self::Completed => RequestStatus::Completed,
            Self::Error => RequestStatus::Failed,
        }
    }

    /// Check if the state is terminal
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl From<Phase> for RunState {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Specify => Self::Specify,
            Phase::Plan => Self::Plan,
            Phase::Implement => Self::Implement,
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Specify => "SPECIFY",
            Self::Plan => "PLAN",
            Self::Implement => "IMPLEMENT",
            Self::Completed => "COMPLETED",
            Self::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Validates a state transition
///
/// # Errors
/// Returns [`StateError::IllegalTransition`] when `to` is not reachable from `from`
pub fn validate_transition(from: RunState, to: RunState) -> Result<(), StateError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(StateError::IllegalTransition { from, to })
    }
}

/// States reachable in one step from `from`
#[must_use]
pub fn allowed_transitions(from: RunState) -> Vec<RunState> {
    use RunState::*;
    match from {
        Pending => vec![Specify, Error],
        Specify => vec![Plan, Error],
        Plan => vec![Implement, Error],
        Implement => vec![Completed, Error],
        Completed | Error => vec![],
    }
}
