//! codeflow core - phase orchestrator
//!
//! Turns a natural-language request into a delivered Python project:
//! - Runs specify → plan → implement against a [`PhaseGenerator`]
//! - Streams [`GenerationEvent`]s to a single consumer
//! - Parses implementation output into files
//! - Validates the delivery with `codeflow-deps` and packages artifacts
//! - Hands the final snapshot to an [`ArtifactStore`]
//!
//! # Example
//!
//! ```rust,ignore
//! use codeflow_core::{CodeflowConfig, InMemoryArtifactStore, Orchestrator, ScriptedGenerator, Transcript};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transcript = Transcript::new("# Spec", "# Plan", "```python:main.py\nprint('hi')\n```");
//! let orchestrator = Orchestrator::new(
//!     CodeflowConfig::default(),
//!     Arc::new(ScriptedGenerator::new(transcript)),
//!     Arc::new(InMemoryArtifactStore::new()),
//! )?;
//!
//! let mut handle = orchestrator.start("print a greeting")?;
//! while let Some(event) = handle.next_event().await {
//!     println!("{}", event.kind());
//! }
//! println!("{} files", handle.artifacts()?.len());
//! # Ok(())
//! # }
//! ```

pub mod artifacts;
pub mod config;
pub mod error;
pub mod events;
pub mod generator;
pub mod orchestrator;
pub mod parser;
pub mod request;
pub mod state_machine;
pub mod store;
pub mod types;

pub use artifacts::{ArtifactSet, ArtifactSnapshot, ProjectMetadata};
pub use config::{CodeflowConfig, CompliancePolicy};
pub use error::{AccessError, ConfigError, CoreError, GenerationError, ParseError, StateError, StoreError};
pub use events::{CompletionSummary, EventStream, FailureKind, FailureReport, GenerationEvent};
pub use generator::{
    Increment, IncrementStream, PhaseContext, PhaseGenerator, PhaseScript, ScriptedGenerator, Transcript,
};
pub use orchestrator::{GenerationHandle, Orchestrator};
pub use parser::parse_implementation;
pub use request::{validate_input, GenerationRequest};
pub use state_machine::RunState;
pub use store::{ArtifactStore, DirectoryStore, InMemoryArtifactStore};
pub use types::{Phase, ReasoningPacket, RequestId, RequestStatus};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
