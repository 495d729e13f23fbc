//! Generation collaborator
//!
//! The model call lives outside this crate. A [`PhaseGenerator`] returns, per
//! phase, a stream of [`Increment`]s; the end of the stream is the phase's
//! terminal signal and an `Err` item aborts the run.
//!
//! [`ScriptedGenerator`] replays a recorded [`Transcript`] and backs the CLI
//! `replay` command and the test suites.

use crate::error::GenerationError;
use crate::types::{Phase, ReasoningPacket, RequestId};
use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One increment of model output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Increment {
    /// Reasoning trace
    Thinking {
        /// Reasoning packets, possibly empty
        #[serde(default)]
        packets: Vec<ReasoningPacket>,
    },
    /// Output text fragment
    Text {
        /// Fragment
        content: String,
    },
}

impl Increment {
    /// Text increment
    #[inline]
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    /// Thinking increment with one packet per item
    #[must_use]
    pub fn thinking<I, S>(packets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Thinking {
            packets: packets.into_iter().map(ReasoningPacket::new).collect(),
        }
    }
}

/// Stream of increments for one phase
pub type IncrementStream = Pin<Box<dyn Stream<Item = Result<Increment, GenerationError>> + Send>>;

/// Inputs available to a phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseContext {
    /// Request being generated
    pub request_id: RequestId,
    /// Phase to generate
    pub phase: Phase,
    /// Validated user input
    pub input: String,
    /// Specify phase output, once available
    pub specification: Option<String>,
    /// Plan phase output, once available
    pub plan: Option<String>,
}

/// External generation call
#[async_trait]
pub trait PhaseGenerator: Send + Sync {
    /// Start generating one phase
    async fn generate(&self, ctx: PhaseContext) -> Result<IncrementStream, GenerationError>;
}

/// Scripted output of one phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseScript {
    /// Increments yielded in order
    pub increments: Vec<Increment>,
    /// Error yielded after the increments
    pub fail: Option<String>,
    /// Never end the stream after the increments
    pub stall: bool,
}

impl PhaseScript {
    /// Script yielding the given text as a single increment
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            increments: vec![Increment::text(content)],
            ..Self::default()
        }
    }

    /// Append an increment
    #[must_use]
    pub fn with_increment(mut self, increment: Increment) -> Self {
        self.increments.push(increment);
        self
    }

    /// Fail after the increments
    #[must_use]
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.fail = Some(message.into());
        self
    }

    /// Stall after the increments
    #[must_use]
    pub fn stalled(mut self) -> Self {
        self.stall = true;
        self
    }
}

/// Recorded output for all three phases
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transcript {
    /// Specify phase
    pub specify: PhaseScript,
    /// Plan phase
    pub plan: PhaseScript,
    /// Implement phase
    pub implement: PhaseScript,
}

impl Transcript {
    /// Text-only transcript
    #[must_use]
    pub fn new(
        specification: impl Into<String>,
        plan: impl Into<String>,
        implementation: impl Into<String>,
    ) -> Self {
        Self {
            specify: PhaseScript::text(specification),
            plan: PhaseScript::text(plan),
            implement: PhaseScript::text(implementation),
        }
    }

    /// Parse from JSON
    ///
    /// # Errors
    /// Returns error on malformed JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Script for a phase
    #[must_use]
    pub fn phase(&self, phase: Phase) -> &PhaseScript {
        match phase {
            Phase::Specify => &self.specify,
            Phase::Plan => &self.plan,
            Phase::Implement => &self.implement,
        }
    }

    /// Mutable script for a phase
    pub fn phase_mut(&mut self, phase: Phase) -> &mut PhaseScript {
        match phase {
            Phase::Specify => &mut self.specify,
            Phase::Plan => &mut self.plan,
            Phase::Implement => &mut self.implement,
        }
    }
}

/// Generator replaying a [`Transcript`]
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    transcript: Transcript,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    /// Create from transcript
    #[must_use]
    pub fn new(transcript: Transcript) -> Self {
        Self {
            transcript,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `generate` calls so far
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PhaseGenerator for ScriptedGenerator {
    async fn generate(&self, ctx: PhaseContext) -> Result<IncrementStream, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let script = self.transcript.phase(ctx.phase);
        tracing::debug!(
            phase = %ctx.phase,
            increments = script.increments.len(),
            "replaying scripted phase"
        );

        let mut items: Vec<Result<Increment, GenerationError>> =
            script.increments.iter().cloned().map(Ok).collect();
        if let Some(message) = &script.fail {
            items.push(Err(GenerationError::upstream(message.clone())));
        }

        let replay = stream::iter(items);
        if script.stall {
            Ok(replay.chain(stream::pending()).boxed())
        } else {
            Ok(replay.boxed())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(phase: Phase) -> PhaseContext {
        PhaseContext {
            request_id: RequestId::new(),
            phase,
            input: "snake".to_string(),
            specification: None,
            plan: None,
        }
    }

    #[tokio::test]
    async fn replays_phase_increments() {
        let transcript = Transcript::new("spec", "plan", "code");
        let generator = ScriptedGenerator::new(transcript);

        let items: Vec<_> = generator.generate(ctx(Phase::Plan)).await.unwrap().collect().await;
        assert_eq!(items, vec![Ok(Increment::text("plan"))]);
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn failure_follows_increments() {
        let mut transcript = Transcript::new("spec", "plan", "code");
        transcript.specify = PhaseScript::default()
            .with_increment(Increment::thinking(["hmm"]))
            .with_failure("rate limited");
        let generator = ScriptedGenerator::new(transcript);

        let items: Vec<_> = generator.generate(ctx(Phase::Specify)).await.unwrap().collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert_eq!(items[1], Err(GenerationError::upstream("rate limited")));
    }

    #[test]
    fn transcript_from_json() {
        let json = r##"{
            "specify": {"increments": [
                {"kind": "thinking", "packets": [{"content": "user wants a timer"}]},
                {"kind": "text", "content": "# Spec"}
            ]},
            "plan": {"increments": [{"kind": "text", "content": "# Plan"}]},
            "implement": {"fail": "upstream 500"}
        }"##;
        let transcript = Transcript::from_json(json).unwrap();
        assert_eq!(transcript.specify.increments.len(), 2);
        assert_eq!(transcript.implement.fail.as_deref(), Some("upstream 500"));
        assert!(!transcript.plan.stall);
    }
}
