//! Phase orchestrator
//!
//! Drives one request through specify → plan → implement on a spawned task:
//! - the task owns the [`GenerationRequest`] and is the only event producer
//! - every increment is forwarded in order as `thinking` or `text`
//! - after implement the delivery is analyzed, checked, packaged and stored
//! - the run ends with exactly one `completion` or `error` event
//!
//! Cancellation (the handle's token, dropping the handle, or dropping the
//! event stream) and the optional phase timeout are observed at every
//! suspension point. At most `max_concurrent_runs` runs are admitted at once;
//! a run's slot is released when its task ends.

use crate::artifacts::{ArtifactSet, ArtifactSnapshot, PackageInputs, ProjectMetadata};
use crate::config::{CodeflowConfig, CompliancePolicy};
use crate::error::{AccessError, CoreError, GenerationError, ParseError, StateError};
use crate::events::{self, CompletionSummary, EventSender, EventStream, FailureKind, FailureReport, GenerationEvent};
use crate::generator::{Increment, PhaseContext, PhaseGenerator};
use crate::parser::parse_implementation;
use crate::request::{validate_input, GenerationRequest};
use crate::state_machine::RunState;
use crate::store::ArtifactStore;
use crate::types::{Phase, RequestId, RequestStatus};
use codeflow_deps::{CodeFiles, ComplianceChecker, ComplianceVerdict, DependencyAnalyzer};
use futures::{Stream, StreamExt};
use once_cell::sync::OnceCell;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Entry point for generation runs
#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<CodeflowConfig>,
    generator: Arc<dyn PhaseGenerator>,
    store: Arc<dyn ArtifactStore>,
    slots: Arc<Semaphore>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("active_runs", &self.active_runs())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Wire an orchestrator from its collaborators
    ///
    /// # Errors
    /// Returns [`CoreError::Config`] when the configuration is out of range
    pub fn new(
        config: CodeflowConfig,
        generator: Arc<dyn PhaseGenerator>,
        store: Arc<dyn ArtifactStore>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let slots = Arc::new(Semaphore::new(config.max_concurrent_runs));
        Ok(Self {
            config: Arc::new(config),
            generator,
            store,
            slots,
        })
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &CodeflowConfig {
        &self.config
    }

    /// Runs whose task has not ended yet
    #[must_use]
    pub fn active_runs(&self) -> usize {
        self.config
            .max_concurrent_runs
            .saturating_sub(self.slots.available_permits())
    }

    /// Validate input and start a run
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// Nothing is spawned when either check fails:
    /// - [`CoreError::InvalidInput`] when the input is empty or too long
    /// - [`CoreError::Busy`] when `max_concurrent_runs` runs are active
    pub fn start(&self, input: &str) -> Result<GenerationHandle, CoreError> {
        let input = validate_input(input, self.config.max_input_chars)?;
        let limit = self.config.max_concurrent_runs;
        let slot = Arc::clone(&self.slots).try_acquire_owned().map_err(|_| {
            tracing::warn!(limit, "run rejected, concurrency limit reached");
            CoreError::Busy { limit }
        })?;

        let request = GenerationRequest::new(input);
        let request_id = request.id();

        let (sender, events) = events::channel(self.config.event_channel_capacity);
        let cancel = CancellationToken::new();
        let outcome = Arc::new(OnceCell::new());
        let (state, state_rx) = watch::channel(request.state());

        let run = Run {
            request,
            config: Arc::clone(&self.config),
            generator: Arc::clone(&self.generator),
            store: Arc::clone(&self.store),
            cancel: cancel.clone(),
            outcome: Arc::clone(&outcome),
            state,
            _slot: slot,
        };

        tracing::info!(request_id = %request_id, "generation requested");
        let span = tracing::info_span!("generation", request_id = %request_id);
        let task = tokio::spawn(run.execute(sender).instrument(span));

        Ok(GenerationHandle {
            request_id,
            events,
            cancel,
            outcome,
            state: state_rx,
            task,
        })
    }
}

/// What a finished run left behind
#[derive(Debug)]
enum RunOutcome {
    Delivered(ArtifactSet),
    Failed(String),
}

/// Caller side of a run: an event stream plus the artifact accessor
///
/// Dropping the handle cancels the run.
#[derive(Debug)]
pub struct GenerationHandle {
    request_id: RequestId,
    events: EventStream,
    cancel: CancellationToken,
    outcome: Arc<OnceCell<RunOutcome>>,
    state: watch::Receiver<RunState>,
    task: JoinHandle<()>,
}

impl GenerationHandle {
    /// Request identifier
    #[inline]
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Next event; `None` after the terminal event
    pub async fn next_event(&mut self) -> Option<GenerationEvent> {
        self.events.next().await
    }

    /// Request cancellation; the run ends with an `error` event
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Check whether the terminal event has been observed
    #[inline]
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.events.is_terminated()
    }

    /// Current lifecycle state of the run
    #[must_use]
    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    /// Caller-facing status; settled before the terminal event is sent
    #[must_use]
    pub fn status(&self) -> RequestStatus {
        self.state().status()
    }

    /// Check whether the run task has exited
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Delivered artifacts
    ///
    /// # Errors
    /// - [`AccessError::NotFinished`] until the terminal event was observed
    /// - [`AccessError::Failed`] when the run ended with an `error` event
    pub fn artifacts(&self) -> Result<&ArtifactSet, AccessError> {
        if !self.events.is_terminated() {
            return Err(AccessError::NotFinished);
        }
        match self.outcome.get() {
            Some(RunOutcome::Delivered(artifacts)) => Ok(artifacts),
            Some(RunOutcome::Failed(message)) => Err(AccessError::Failed(message.clone())),
            None => Err(AccessError::Failed("run ended without a terminal event".to_string())),
        }
    }
}

impl Stream for GenerationHandle {
    type Item = GenerationEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().events).poll_next(cx)
    }
}

impl Drop for GenerationHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Why a run failed
#[derive(Debug)]
enum RunFailure {
    Generation { phase: Phase, error: GenerationError },
    Parse(ParseError),
    Compliance {
        verdict: ComplianceVerdict,
        missing_local_files: Vec<String>,
    },
    State(StateError),
}

impl RunFailure {
    fn kind(&self) -> FailureKind {
        match self {
            Self::Generation { .. } | Self::State(_) => FailureKind::GenerationFailure,
            Self::Parse(_) => FailureKind::ParseFailure,
            Self::Compliance { .. } => FailureKind::ComplianceViolation,
        }
    }
}

impl From<StateError> for RunFailure {
    fn from(e: StateError) -> Self {
        Self::State(e)
    }
}

/// State owned by the spawned task
struct Run {
    request: GenerationRequest,
    config: Arc<CodeflowConfig>,
    generator: Arc<dyn PhaseGenerator>,
    store: Arc<dyn ArtifactStore>,
    cancel: CancellationToken,
    outcome: Arc<OnceCell<RunOutcome>>,
    state: watch::Sender<RunState>,
    _slot: OwnedSemaphorePermit,
}

impl Run {
    async fn execute(mut self, sender: EventSender) {
        let terminal = match self.drive(&sender).await {
            Ok(summary) => GenerationEvent::Completion(summary),
            Err(failure) => self.fail(failure),
        };
        if sender.finish(terminal).await.is_err() {
            tracing::debug!("consumer gone before the terminal event");
        }
    }

    async fn drive(&mut self, sender: &EventSender) -> Result<CompletionSummary, RunFailure> {
        let mut specification = String::new();
        let mut plan = String::new();
        let mut files = CodeFiles::new();

        for phase in Phase::ORDER {
            self.request.enter(phase)?;
            self.publish_state();
            tracing::info!(phase = %phase, "phase started");

            let generation = |error| RunFailure::Generation { phase, error };
            self.emit(
                sender,
                GenerationEvent::PhaseStart {
                    phase,
                    description: phase.description().to_string(),
                },
            )
            .await
            .map_err(generation)?;
            if self.config.educational_messages {
                self.emit(
                    sender,
                    GenerationEvent::EducationalMessage {
                        phase,
                        message: phase.educational_message().to_string(),
                    },
                )
                .await
                .map_err(generation)?;
            }

            let ctx = PhaseContext {
                request_id: self.request.id(),
                phase,
                input: self.request.input().to_string(),
                specification: (!specification.is_empty()).then(|| specification.clone()),
                plan: (!plan.is_empty()).then(|| plan.clone()),
            };
            let text = self.run_phase(sender, ctx).await.map_err(generation)?;

            if phase == Phase::Implement {
                files = parse_implementation(&text).map_err(RunFailure::Parse)?;
            }

            let content_length = text.chars().count();
            self.emit(sender, GenerationEvent::PhaseComplete { phase, content_length })
                .await
                .map_err(generation)?;
            tracing::info!(phase = %phase, content_length, "phase complete");

            match phase {
                Phase::Specify => specification = text,
                Phase::Plan => plan = text,
                Phase::Implement => {}
            }
        }

        self.deliver(&files, &specification, &plan).await
    }

    fn publish_state(&self) {
        self.state.send_replace(self.request.state());
    }

    fn settle(&self, outcome: RunOutcome) {
        if self.outcome.set(outcome).is_err() {
            tracing::warn!("run outcome already settled");
        }
    }

    /// Stream one phase, forwarding increments and accumulating its text
    async fn run_phase(&self, sender: &EventSender, ctx: PhaseContext) -> Result<String, GenerationError> {
        let phase = ctx.phase;
        let deadline = self.config.phase_timeout().map(|budget| Instant::now() + budget);

        let mut increments = self
            .guarded(sender, phase, deadline, self.generator.generate(ctx))
            .await?;

        let mut text = String::new();
        let mut count = 0usize;
        loop {
            let next = self
                .guarded(sender, phase, deadline, async { Ok(increments.next().await) })
                .await?;
            let Some(increment) = next else { break };

            count += 1;
            let event = match increment? {
                Increment::Thinking { packets } => GenerationEvent::Thinking { phase, packets },
                Increment::Text { content } => {
                    text.push_str(&content);
                    GenerationEvent::Text { phase, content }
                }
            };
            self.emit(sender, event).await?;
        }

        tracing::debug!(phase = %phase, increments = count, "phase stream ended");
        if text.trim().is_empty() {
            return Err(GenerationError::EmptyOutput(phase));
        }
        Ok(text)
    }

    /// Await `fut` unless the run is cancelled or the phase runs out of time
    async fn guarded<T>(
        &self,
        sender: &EventSender,
        phase: Phase,
        deadline: Option<Instant>,
        fut: impl Future<Output = Result<T, GenerationError>>,
    ) -> Result<T, GenerationError> {
        let expired = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(GenerationError::Cancelled),
            () = sender.closed() => Err(GenerationError::Cancelled),
            () = expired => Err(GenerationError::Timeout {
                phase,
                secs: self.config.phase_timeout_secs,
            }),
            result = fut => result,
        }
    }

    async fn emit(&self, sender: &EventSender, event: GenerationEvent) -> Result<(), GenerationError> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(GenerationError::Cancelled),
            sent = sender.emit(event) => sent.map_err(|_| GenerationError::Cancelled),
        }
    }

    async fn deliver(
        &mut self,
        files: &CodeFiles,
        specification: &str,
        plan: &str,
    ) -> Result<CompletionSummary, RunFailure> {
        let analysis = DependencyAnalyzer::new()
            .with_options(self.config.analyzer_options())
            .analyze_project(files);
        let verdict = ComplianceChecker::new().check(files, &analysis.manifest);

        if !verdict.compliant() {
            tracing::warn!(
                violations = verdict.violation_count(),
                policy = ?self.config.compliance_policy,
                "delivery is not self-contained"
            );
            if self.config.compliance_policy == CompliancePolicy::Enforce {
                return Err(RunFailure::Compliance {
                    verdict,
                    missing_local_files: analysis.missing_local_files,
                });
            }
        }

        let created_at = self.request.created_at();
        let artifacts = ArtifactSet::package(&PackageInputs {
            input: self.request.input(),
            specification,
            plan,
            files,
            analysis: &analysis,
            created_at,
        })
        .ok_or(RunFailure::Parse(ParseError::NoSourceFile))?;

        self.request.complete()?;
        self.publish_state();

        let request_id = self.request.id();
        let snapshot = ArtifactSnapshot {
            metadata: ProjectMetadata::describe(request_id, created_at, &artifacts, &analysis, verdict.compliant()),
            artifacts,
        };
        let persisted = match self.store.write(request_id, &snapshot).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, "artifact store rejected the snapshot");
                false
            }
        };

        let summary = CompletionSummary {
            request_id,
            project_name: snapshot.artifacts.project_name().to_string(),
            files: snapshot.artifacts.names().map(str::to_string).collect(),
            main_file: snapshot.artifacts.main_file().to_string(),
            dependencies: analysis.packages().into_iter().map(str::to_string).collect(),
            missing_local_files: analysis.missing_local_files,
            verdict,
            advisories: analysis.advisories,
            syntax_errors: analysis.syntax_errors,
            persisted,
        };
        tracing::info!(
            project = %summary.project_name,
            files = summary.files.len(),
            dependencies = summary.dependencies.len(),
            compliant = summary.verdict.compliant(),
            "project delivered"
        );

        self.settle(RunOutcome::Delivered(snapshot.artifacts));
        Ok(summary)
    }

    fn fail(&mut self, failure: RunFailure) -> GenerationEvent {
        let phase = self.request.phase();
        if let Err(e) = self.request.fail() {
            tracing::warn!(error = %e, "request already terminal");
        }
        self.publish_state();

        let kind = failure.kind();
        let (message, verdict, missing_local_files) = match failure {
            RunFailure::Generation { error, .. } => (error.to_string(), None, Vec::new()),
            RunFailure::Parse(error) => (error.to_string(), None, Vec::new()),
            RunFailure::State(error) => (error.to_string(), None, Vec::new()),
            RunFailure::Compliance {
                verdict,
                missing_local_files,
            } => (
                format!("{} undeclared dependencies in delivery", verdict.violation_count()),
                Some(verdict),
                missing_local_files,
            ),
        };

        tracing::error!(phase = ?phase, kind = %kind, message = %message, "generation failed");
        self.settle(RunOutcome::Failed(message.clone()));

        GenerationEvent::Error(FailureReport {
            request_id: self.request.id(),
            phase,
            kind,
            message,
            verdict,
            missing_local_files,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{ScriptedGenerator, Transcript};
    use crate::store::InMemoryArtifactStore;

    fn orchestrator(config: CodeflowConfig) -> Orchestrator {
        let transcript = Transcript::new("# Spec", "# Plan", "```python:main.py\nprint('hi')\n```");
        Orchestrator::new(
            config,
            Arc::new(ScriptedGenerator::new(transcript)),
            Arc::new(InMemoryArtifactStore::new()),
        )
        .unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let result = Orchestrator::new(
            CodeflowConfig::new().with_channel_capacity(0),
            Arc::new(ScriptedGenerator::default()),
            Arc::new(InMemoryArtifactStore::new()),
        );
        assert!(matches!(result, Err(CoreError::Config(_))));
    }

    #[tokio::test]
    async fn empty_input_never_starts() {
        let orch = orchestrator(CodeflowConfig::default());
        assert!(matches!(orch.start("  "), Err(CoreError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn minimal_run_completes() {
        let orch = orchestrator(CodeflowConfig::default().with_educational_messages(false));
        let mut handle = orch.start("hello world").unwrap();

        let mut kinds = Vec::new();
        while let Some(event) = handle.next_event().await {
            kinds.push(event.kind());
        }
        assert_eq!(kinds.last(), Some(&"completion"));
        assert!(!kinds.contains(&"educational_message"));
        assert_eq!(handle.artifacts().unwrap().main_file(), "main.py");
    }

    #[test]
    fn outcome_settles_once() {
        let request = GenerationRequest::new("hello world".to_string());
        let (state, state_rx) = watch::channel(request.state());
        let outcome = Arc::new(OnceCell::new());
        let run = Run {
            request,
            config: Arc::new(CodeflowConfig::default()),
            generator: Arc::new(ScriptedGenerator::default()),
            store: Arc::new(InMemoryArtifactStore::new()),
            cancel: CancellationToken::new(),
            outcome: Arc::clone(&outcome),
            state,
            _slot: Arc::new(Semaphore::new(1)).try_acquire_owned().unwrap(),
        };

        run.settle(RunOutcome::Failed("first".to_string()));
        run.settle(RunOutcome::Delivered(ArtifactSet::default()));
        assert!(matches!(outcome.get(), Some(RunOutcome::Failed(m)) if m == "first"));
        assert_eq!(*state_rx.borrow(), RunState::Pending);
    }

    #[test]
    fn failure_kinds() {
        assert_eq!(RunFailure::Parse(ParseError::NoCode).kind(), FailureKind::ParseFailure);
        assert_eq!(
            RunFailure::Generation {
                phase: Phase::Plan,
                error: GenerationError::Cancelled,
            }
            .kind(),
            FailureKind::GenerationFailure
        );
    }
}
