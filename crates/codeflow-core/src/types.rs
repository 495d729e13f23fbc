//! Core types for codeflow
//!
//! - Request identifiers
//! - The three generation phases and their fixed order
//! - Request status as seen by callers
//! - Reasoning packets relayed from the model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique generation request identifier (UUID v4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Generate new request ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generation phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Turn the request into a specification
    Specify,
    /// Design the implementation
    Plan,
    /// Write the code
    Implement,
}

impl Phase {
    /// Phases in execution order
    pub const ORDER: [Phase; 3] = [Phase::Specify, Phase::Plan, Phase::Implement];

    /// Lowercase tag
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Specify => "specify",
            Self::Plan => "plan",
            Self::Implement => "implement",
        }
    }

    /// Short description carried by `phase_start`
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Specify => "Analyzing the request and writing a technical specification",
            Self::Plan => "Designing the architecture and implementation plan",
            Self::Implement => "Writing the project source code",
        }
    }

    /// Longer explanation emitted as `educational_message` when enabled
    #[must_use]
    pub const fn educational_message(self) -> &'static str {
        match self {
            Self::Specify => {
                "Specify: the request is turned into explicit requirements, constraints and \
                 acceptance criteria. Clear requirements prevent rework later on."
            }
            Self::Plan => {
                "Plan: the specification is mapped onto modules, data structures and \
                 libraries. A good plan keeps each file small and its imports explicit."
            }
            Self::Implement => {
                "Implement: the plan becomes runnable files. Every import is checked against \
                 the standard library, the generated requirements and the delivered files."
            }
        }
    }

    /// Phase that follows this one
    #[must_use]
    pub const fn next(self) -> Option<Phase> {
        match self {
            Self::Specify => Some(Self::Plan),
            Self::Plan => Some(Self::Implement),
            Self::Implement => None,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request status exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    /// Created, no phase entered yet
    Pending,
    /// A phase is running
    InProgress,
    /// Delivered
    Completed,
    /// Ended with an error event
    Failed,
}

impl RequestStatus {
    /// Check if no further transitions are possible
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// One unit of model reasoning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningPacket {
    /// Reasoning text
    pub content: String,
}

impl ReasoningPacket {
    /// Create packet
    #[inline]
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_order_follows_next() {
        assert_eq!(Phase::ORDER[0].next(), Some(Phase::ORDER[1]));
        assert_eq!(Phase::ORDER[1].next(), Some(Phase::ORDER[2]));
        assert_eq!(Phase::ORDER[2].next(), None);
    }

    #[test]
    fn phase_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Phase::Implement).unwrap(), "\"implement\"");
        assert_eq!(Phase::Plan.to_string(), "plan");
    }

    #[test]
    fn status_serializes_upper() {
        assert_eq!(serde_json::to_string(&RequestStatus::InProgress).unwrap(), "\"IN_PROGRESS\"");
        assert!(RequestStatus::Failed.is_terminal());
        assert!(!RequestStatus::Pending.is_terminal());
    }

    #[test]
    fn request_ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }
}
