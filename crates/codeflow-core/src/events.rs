//! Streaming event channel
//!
//! A run publishes [`GenerationEvent`]s through an [`EventSender`] and the
//! caller consumes them from an [`EventStream`]. The channel is bounded,
//! single-producer and single-consumer. The sender can only emit the terminal
//! event through [`EventSender::finish`], which consumes it, so at most one
//! terminal event exists per run and nothing can follow it.

use crate::types::{Phase, ReasoningPacket, RequestId};
use codeflow_deps::{Advisory, ComplianceVerdict, SyntaxIssue};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Event published during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationEvent {
    /// A phase started
    PhaseStart {
        /// Phase entered
        phase: Phase,
        /// Short human-readable description
        description: String,
    },
    /// A phase finished successfully
    PhaseComplete {
        /// Phase finished
        phase: Phase,
        /// Characters of text produced
        content_length: usize,
    },
    /// Model reasoning trace
    Thinking {
        /// Current phase
        phase: Phase,
        /// Reasoning packets, possibly empty
        packets: Vec<ReasoningPacket>,
    },
    /// Incremental output
    Text {
        /// Current phase
        phase: Phase,
        /// Output fragment
        content: String,
    },
    /// Explanation of the phase for learners
    EducationalMessage {
        /// Current phase
        phase: Phase,
        /// Message text
        message: String,
    },
    /// Terminal: project delivered
    Completion(CompletionSummary),
    /// Terminal: run failed
    Error(FailureReport),
}

impl GenerationEvent {
    /// Check if this event ends the stream
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completion(_) | Self::Error(_))
    }

    /// Phase tag, if the event carries one
    #[must_use]
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::PhaseStart { phase, .. }
            | Self::PhaseComplete { phase, .. }
            | Self::Thinking { phase, .. }
            | Self::Text { phase, .. }
            | Self::EducationalMessage { phase, .. } => Some(*phase),
            Self::Completion(_) => None,
            Self::Error(report) => report.phase,
        }
    }

    /// Wire name of the event kind
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::PhaseStart { .. } => "phase_start",
            Self::PhaseComplete { .. } => "phase_complete",
            Self::Thinking { .. } => "thinking",
            Self::Text { .. } => "text",
            Self::EducationalMessage { .. } => "educational_message",
            Self::Completion(_) => "completion",
            Self::Error(_) => "error",
        }
    }
}

/// Payload of the `completion` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionSummary {
    /// Request delivered
    pub request_id: RequestId,
    /// Generated project name
    pub project_name: String,
    /// Artifact names, sorted
    pub files: Vec<String>,
    /// Entry point
    pub main_file: String,
    /// Third-party packages written to the manifest
    pub dependencies: Vec<String>,
    /// Local modules imported but not delivered
    pub missing_local_files: Vec<String>,
    /// Compliance of the delivery against its generated manifest
    pub verdict: ComplianceVerdict,
    /// Dependency-set observations
    #[serde(default)]
    pub advisories: Vec<Advisory>,
    /// Delivered files that do not parse as Python
    #[serde(default)]
    pub syntax_errors: Vec<SyntaxIssue>,
    /// Whether the artifact store accepted the snapshot
    pub persisted: bool,
}

/// Failure category carried by the `error` event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Model call failed, timed out or was cancelled
    GenerationFailure,
    /// Implementation output had no usable files
    ParseFailure,
    /// Delivery is not hermetic and the policy is `enforce`
    ComplianceViolation,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::GenerationFailure => "generation_failure",
            Self::ParseFailure => "parse_failure",
            Self::ComplianceViolation => "compliance_violation",
        };
        f.write_str(s)
    }
}

/// Payload of the `error` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    /// Request that failed
    pub request_id: RequestId,
    /// Phase in progress when the failure happened
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    /// Failure category
    pub kind: FailureKind,
    /// Human-readable message
    pub message: String,
    /// Compliance detail (compliance failures only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<ComplianceVerdict>,
    /// Local modules imported but not delivered
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_local_files: Vec<String>,
}

/// Event could not be delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// Consumer dropped the stream
    #[error("event stream closed")]
    Closed,

    /// Terminal events go through `finish`
    #[error("terminal event passed to emit")]
    TerminalViaEmit,

    /// `finish` requires a terminal event
    #[error("non-terminal event passed to finish")]
    NotTerminal,
}

/// Create a bounded event channel
#[must_use]
pub fn channel(capacity: usize) -> (EventSender, EventStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSender { tx }, EventStream { rx, done: false })
}

/// Producer half, owned by the run
#[derive(Debug)]
pub struct EventSender {
    tx: mpsc::Sender<GenerationEvent>,
}

impl EventSender {
    /// Publish a non-terminal event, waiting for channel capacity
    ///
    /// # Errors
    /// Returns [`SendError::Closed`] when the consumer is gone and
    /// [`SendError::TerminalViaEmit`] for terminal events
    pub async fn emit(&self, event: GenerationEvent) -> Result<(), SendError> {
        if event.is_terminal() {
            return Err(SendError::TerminalViaEmit);
        }
        self.tx.send(event).await.map_err(|_| SendError::Closed)
    }

    /// Publish the terminal event and close the channel
    ///
    /// # Errors
    /// Returns [`SendError::NotTerminal`] for non-terminal events and
    /// [`SendError::Closed`] when the consumer is gone
    pub async fn finish(self, event: GenerationEvent) -> Result<(), SendError> {
        if !event.is_terminal() {
            return Err(SendError::NotTerminal);
        }
        self.tx.send(event).await.map_err(|_| SendError::Closed)
    }

    /// Resolves once the consumer has dropped the stream
    pub async fn closed(&self) {
        self.tx.closed().await;
    }

    /// Check whether the consumer is gone
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half; ends after the terminal event
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<GenerationEvent>,
    done: bool,
}

impl EventStream {
    /// Check whether the terminal event has been yielded
    #[inline]
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.done
    }
}

impl Stream for EventStream {
    type Item = GenerationEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                if event.is_terminal() {
                    this.done = true;
                    this.rx.close();
                }
                Poll::Ready(Some(event))
            }
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
