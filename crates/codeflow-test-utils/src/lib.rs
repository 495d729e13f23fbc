//! Testing utilities for codeflow workspace
//!
//! Shared fixtures: transcripts, project builders and an orchestrator wired
//! to an in-memory store.

#![allow(missing_docs)]

use codeflow_core::{
    CodeflowConfig, GenerationEvent, GenerationHandle, InMemoryArtifactStore, Increment, Orchestrator,
    PhaseScript, ScriptedGenerator, Transcript,
};
use codeflow_deps::CodeFiles;
use futures::StreamExt;
use std::sync::Arc;

pub const SNAKE_SPEC: &str = "# Snake Game\n\n## Requirements\n- Arrow keys steer the snake\n- Eating food grows the snake\n- Hitting a wall ends the game\n";

pub const SNAKE_PLAN: &str = "# Plan\n\n- `main.py`: game loop and rendering with pygame\n- `utils.py`: grid helpers\n";

pub const SNAKE_IMPLEMENTATION: &str = "Here is the game.\n\n```python:main.py\nimport random\nimport pygame\nfrom utils import clamp\n\ndef main():\n    pygame.init()\n    print(clamp(random.randint(0, 30), 0, 20))\n\nif __name__ == \"__main__\":\n    main()\n```\n\n```python:utils.py\nimport os\n\ndef clamp(value, low, high):\n    return max(low, min(high, value))\n```\n";

/// Snake game transcript with a reasoning packet per phase
pub fn snake_game_transcript() -> Transcript {
    let mut transcript = Transcript::default();
    transcript.specify = PhaseScript::default()
        .with_increment(Increment::thinking(["user wants a classic snake game"]))
        .with_increment(Increment::text(&SNAKE_SPEC[..13]))
        .with_increment(Increment::text(&SNAKE_SPEC[13..]));
    transcript.plan = PhaseScript::default()
        .with_increment(Increment::thinking(["pygame handles input and drawing"]))
        .with_increment(Increment::text(SNAKE_PLAN));
    transcript.implement = PhaseScript::default()
        .with_increment(Increment::thinking(Vec::<String>::new()))
        .with_increment(Increment::text(SNAKE_IMPLEMENTATION));
    transcript
}

/// Fixed specification and plan with the given implementation text
pub fn transcript_with_implementation(implementation: &str) -> Transcript {
    Transcript::new(SNAKE_SPEC, SNAKE_PLAN, implementation)
}

/// Orchestrator replaying `transcript`, plus its store and generator
pub fn test_orchestrator(
    transcript: Transcript,
    config: CodeflowConfig,
) -> (Orchestrator, Arc<InMemoryArtifactStore>, Arc<ScriptedGenerator>) {
    let store = Arc::new(InMemoryArtifactStore::new());
    let generator = Arc::new(ScriptedGenerator::new(transcript));
    let orchestrator = Orchestrator::new(config, generator.clone(), store.clone()).unwrap();
    (orchestrator, store, generator)
}

/// Drain a handle until its stream ends
pub async fn collect_events(handle: &mut GenerationHandle) -> Vec<GenerationEvent> {
    let mut events = Vec::new();
    while let Some(event) = handle.next().await {
        events.push(event);
    }
    events
}

/// Event kinds, in order
pub fn kinds(events: &[GenerationEvent]) -> Vec<&'static str> {
    events.iter().map(GenerationEvent::kind).collect()
}

/// Build a project from `(path, contents)` pairs
pub fn project(files: &[(&str, &str)]) -> CodeFiles {
    let mut project = CodeFiles::new();
    for (path, contents) in files {
        project.insert(path, *contents).unwrap();
    }
    project
}
