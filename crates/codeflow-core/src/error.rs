//! Error types for codeflow core
//!
//! Provides error handling for:
//! - Request validation
//! - Model generation failures (including cancellation and timeouts)
//! - Implementation output parsing
//! - State machine violations
//! - Artifact persistence
//! - Configuration loading

use crate::state_machine::RunState;
use crate::types::{Phase, RequestId};
use codeflow_deps::DepsError;

/// Main codeflow error type
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// User input rejected before a run starts
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Model generation failed
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    /// Implementation output could not be split into files
    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),

    /// Illegal state transition
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// Artifact persistence failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Concurrent run limit reached
    #[error("server busy: {limit} runs already active")]
    Busy {
        /// Configured limit
        limit: usize,
    },
}

impl CoreError {
    /// Create invalid input error
    #[inline]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Check if a new request with the same input might succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Generation(e) => e.is_retryable(),
            Self::Store(e) => e.is_retryable(),
            Self::Busy { .. } => true,
            _ => false,
        }
    }
}

/// Failure of the external generation call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// Model provider reported an error
    #[error("model call failed: {0}")]
    Upstream(String),

    /// Caller cancelled or stopped consuming events
    #[error("generation cancelled")]
    Cancelled,

    /// Phase exceeded its configured time budget
    #[error("phase {phase} timed out after {secs}s")]
    Timeout {
        /// Phase that timed out
        phase: Phase,
        /// Configured budget
        secs: u64,
    },

    /// Phase ended without any text
    #[error("phase {0} produced no output")]
    EmptyOutput(Phase),
}

impl GenerationError {
    /// Create upstream error
    #[inline]
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    /// Check if error is transient
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Upstream(_) | Self::Timeout { .. })
    }

    /// Check if error came from cancellation
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Implementation text could not be decomposed into files
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Nothing left after stripping reasoning blocks
    #[error("implementation output is empty")]
    Empty,

    /// No code blocks and no code-like text
    #[error("no code found in implementation output")]
    NoCode,

    /// Files were found but none is a Python source file
    #[error("no python source file in implementation output")]
    NoSourceFile,

    /// A code block named an unusable path
    #[error("invalid file path: {0}")]
    InvalidPath(#[from] DepsError),
}

/// State machine violations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// Transition not in the allowed set
    #[error("illegal transition {from} -> {to}")]
    IllegalTransition {
        /// Current state
        from: RunState,
        /// Requested state
        to: RunState,
    },
}

/// Artifact persistence errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot could not be serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A snapshot was already written for this request
    #[error("artifacts already written for request {0}")]
    AlreadyWritten(RequestId),
}

impl StoreError {
    /// Check if a retry could succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    /// TOML syntax or type error
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Value out of range
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

impl ConfigError {
    /// Create invalid value error
    #[inline]
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Artifact access before the run delivered anything
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    /// Terminal event not yet observed
    #[error("artifacts are available only after the terminal event")]
    NotFinished,

    /// Run ended with an error event
    #[error("run failed: {0}")]
    Failed(String),
}
