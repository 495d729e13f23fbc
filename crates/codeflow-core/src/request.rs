//! Generation request lifecycle
//!
//! A [`GenerationRequest`] is owned by exactly one run. State changes go
//! through [`validate_transition`], so a terminal request can never change
//! again.

use crate::error::{CoreError, StateError};
use crate::state_machine::{validate_transition, RunState};
use crate::types::{Phase, RequestId, RequestStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Validate and normalize raw user input
///
/// Input is trimmed; it must be non-empty and at most `max_chars` characters.
///
/// # Errors
/// Returns [`CoreError::InvalidInput`] when either bound is violated
pub fn validate_input(raw: &str, max_chars: usize) -> Result<String, CoreError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CoreError::invalid_input("input must not be empty"));
    }
    let chars = trimmed.chars().count();
    if chars > max_chars {
        return Err(CoreError::invalid_input(format!(
            "input is {chars} characters, limit is {max_chars}"
        )));
    }
    Ok(trimmed.to_string())
}

/// One generation request
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    id: RequestId,
    input: String,
    state: RunState,
    created_at: DateTime<Utc>,
}

impl GenerationRequest {
    /// Create pending request from already validated input
    #[must_use]
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            id: RequestId::new(),
            input: input.into(),
            state: RunState::Pending,
            created_at: Utc::now(),
        }
    }

    /// Request identifier
    #[inline]
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// User input
    #[inline]
    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Caller-facing status
    #[inline]
    #[must_use]
    pub fn status(&self) -> RequestStatus {
        self.state.status()
    }

    /// Phase marker
    #[inline]
    #[must_use]
    pub fn phase(&self) -> Option<Phase> {
        self.state.phase()
    }

    /// Creation time
    #[inline]
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Enter the next phase
    ///
    /// # Errors
    /// Returns error if `phase` is not the next phase
    pub fn enter(&mut self, phase: Phase) -> Result<(), StateError> {
        self.transition(RunState::from(phase))
    }

    /// Mark delivered
    ///
    /// # Errors
    /// Returns error unless the implement phase is current
    pub fn complete(&mut self) -> Result<(), StateError> {
        self.transition(RunState::Completed)
    }

    /// Mark failed
    ///
    /// # Errors
    /// Returns error if the request is already terminal
    pub fn fail(&mut self) -> Result<(), StateError> {
        self.transition(RunState::Error)
    }

    fn transition(&mut self, to: RunState) -> Result<(), StateError> {
        validate_transition(self.state, to)?;
        tracing::debug!(request_id = %self.id, from = %self.state, to = %to, "request transition");
        self.state = to;
        Ok(())
    }
}
