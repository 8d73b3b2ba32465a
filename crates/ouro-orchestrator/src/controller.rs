//! Reflexion controller - the generate / execute / heal / verify loop
//!
//! Each attempt composes a fresh prompt from the directive and the most
//! recent failure only. There is no conversation history: the previous
//! attempt's code and error are all the model sees of the past.
//!
//! Control flow lives in [`crate::state_machine`]; this module does the work
//! for each state and performs the actions transitions ask for.

use crate::activity_logger::ActivityLogger;
use crate::prompt::compose;
use crate::state_machine::{transition, Action, Event, State};
use ouro_agent::{GenerationProvider, ModelCascadeClient};
use ouro_core::{
    AttemptRecord, Directive, ExecutionResult, GenerationResult, OuroConfig, RunResult,
    SessionState, StatusSink, StatusUpdate, TerminalVerdict, TracingStatusSink, Verdict,
    OURO_DIR,
};
use ouro_sandbox::{CodeExecutor, OutputVerifier, PackageInstaller, SelfHealer};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How a session ended
#[derive(Debug, Clone, Serialize)]
pub struct SessionOutcome {
    pub session_id: String,
    pub verdict: TerminalVerdict,
    /// Generation calls made (initial attempt included)
    pub attempts_used: usize,
    /// Why the loop failed, if it did
    pub failure_reason: Option<String>,
    /// Last attempt; earlier ones are superseded
    pub final_attempt: Option<AttemptRecord>,
    pub result: RunResult,
}

impl SessionOutcome {
    pub fn success(&self) -> bool {
        self.verdict == TerminalVerdict::Success
    }

    /// Verdict of the attempt that ended the session, if any ran
    pub fn last_verdict(&self) -> Option<Verdict> {
        self.final_attempt.as_ref().map(|a| a.verdict)
    }

    /// Whether the final code is the cascade's diagnostic program
    pub fn generation_exhausted(&self) -> bool {
        self.final_attempt
            .as_ref()
            .map(|a| a.generation.is_sentinel())
            .unwrap_or(false)
    }
}

/// Drives one directive to success or budget exhaustion
pub struct ReflexionController<P, E, I>
where
    P: GenerationProvider,
    E: CodeExecutor,
    I: PackageInstaller,
{
    cascade: ModelCascadeClient<P>,
    executor: E,
    healer: SelfHealer<I>,
    verifier: OutputVerifier,
    max_reflexion: usize,
    status: Arc<dyn StatusSink>,
    activity_logger: Option<ActivityLogger>,
}

impl<P, E, I> ReflexionController<P, E, I>
where
    P: GenerationProvider,
    E: CodeExecutor,
    I: PackageInstaller,
{
    pub fn new(
        cascade: ModelCascadeClient<P>,
        executor: E,
        healer: SelfHealer<I>,
        max_reflexion: usize,
    ) -> Self {
        Self {
            cascade,
            executor,
            healer,
            verifier: OutputVerifier::new(),
            max_reflexion,
            status: Arc::new(TracingStatusSink),
            activity_logger: None,
        }
    }

    /// Wire every component from a loaded configuration
    pub fn from_config(
        config: &OuroConfig,
        work_dir: &Path,
        provider: P,
        executor: E,
        installer: I,
        status: Arc<dyn StatusSink>,
    ) -> Self {
        let cascade =
            ModelCascadeClient::from_config(provider, &config.cascade).with_status_sink(status.clone());
        let healer =
            SelfHealer::new(installer, config.healing.clone()).with_status_sink(status.clone());

        let controller = Self::new(cascade, executor, healer, config.reflexion.max_reflexion)
            .with_status_sink(status);

        if config.reflexion.activity_log {
            controller.with_activity_logging(work_dir.join(OURO_DIR))
        } else {
            controller
        }
    }

    pub fn with_status_sink(mut self, status: Arc<dyn StatusSink>) -> Self {
        self.status = status;
        self
    }

    /// Enable activity logging to `<ouro_dir>/activity.md`
    pub fn with_activity_logging(mut self, ouro_dir: impl Into<std::path::PathBuf>) -> Self {
        self.activity_logger = Some(ActivityLogger::new(ouro_dir.into()));
        self
    }

    pub fn cascade(&self) -> &ModelCascadeClient<P> {
        &self.cascade
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn healer(&self) -> &SelfHealer<I> {
        &self.healer
    }

    pub fn max_reflexion(&self) -> usize {
        self.max_reflexion
    }

    /// Run a directive to completion. Never returns an error: provider,
    /// execution and healing failures all end up in the outcome.
    pub async fn run(&mut self, directive: Directive) -> SessionOutcome {
        let session_id = uuid::Uuid::new_v4().to_string()[..8].to_string();
        info!(
            "Starting {} session {}: {}",
            directive.mode(),
            session_id,
            directive.summary()
        );

        if let Some(logger) = &self.activity_logger {
            logger
                .log_session_start(&session_id, &directive, self.max_reflexion)
                .await;
        }

        let mut session = SessionState::new(directive, self.max_reflexion);
        let mut state = State::initial();
        let mut attempts_used = 0;

        let mut prompt = String::new();
        let mut generation: Option<GenerationResult> = None;
        let mut code = String::new();
        let mut execution = ExecutionResult::default();
        let mut heal_actions = Vec::new();
        let mut final_attempt: Option<AttemptRecord> = None;

        while !state.is_terminal() {
            let event = match &state {
                State::Compose { attempt } => {
                    info!("=== Attempt {} of {} ===", attempt + 1, self.max_reflexion + 1);
                    prompt = compose(&session.next_request());
                    debug!("Prompt is {} chars", prompt.len());
                    Event::PromptReady
                }

                State::Generate { .. } => {
                    attempts_used += 1;
                    let result = self.cascade.generate(&prompt).await;
                    code = result.source_code.clone();
                    let model_id = result.model_id.clone();
                    generation = Some(result);
                    Event::CodeReady { model_id }
                }

                State::Execute { .. } => {
                    heal_actions.clear();
                    execution = self.executor.execute(&code).await;
                    Event::ExecutionFinished {
                        exit_code: execution.exit_code,
                        remediable: self.healer.is_remediable(&execution),
                    }
                }

                State::Heal { .. } => {
                    let failed = std::mem::take(&mut execution);
                    let outcome = self.healer.heal(&mut self.executor, &code, failed).await;
                    execution = outcome.result;
                    code = outcome.code;
                    heal_actions = outcome.actions;
                    Event::HealFinished {
                        actions: heal_actions.len(),
                    }
                }

                State::Verify { attempt } => match generation.take() {
                    // Verify is only reachable through Generate
                    None => Event::Error {
                        message: "Verify reached without a generation".to_string(),
                    },
                    Some(generation) => {
                        let verdict = self.verifier.verify(&execution);
                        if let Some(error_context) =
                            self.verifier.error_context(verdict, &execution)
                        {
                            warn!("Attempt {} failed: {}", attempt + 1, verdict);
                            // The model is shown its own output, not the healed program
                            session.record_failure(&generation.source_code, &error_context);
                        }

                        let record = AttemptRecord {
                            index: *attempt,
                            generation,
                            execution: execution.clone(),
                            final_code: code.clone(),
                            heal_actions: std::mem::take(&mut heal_actions),
                            verdict,
                        };
                        if let Some(logger) = &self.activity_logger {
                            logger.log_attempt(&record, self.max_reflexion).await;
                        }
                        final_attempt = Some(record);

                        Event::Verified {
                            verdict,
                            budget_exhausted: session.budget_exhausted(),
                        }
                    }
                },

                State::DoneSuccess { .. } | State::DoneFail { .. } => break,
            };

            let (next, actions) = transition(state, event);
            self.perform(actions).await;
            state = next;
        }

        let (verdict, failure_reason) = match state {
            State::DoneSuccess { .. } => (TerminalVerdict::Success, None),
            State::DoneFail { reason } => (TerminalVerdict::Fail, Some(reason)),
            other => (
                TerminalVerdict::Fail,
                Some(format!("Loop stopped in non-terminal state {:?}", other)),
            ),
        };
        session.terminal_verdict = Some(verdict);

        let success = verdict == TerminalVerdict::Success;
        let result = RunResult {
            success,
            stdout: execution.stdout,
            stderr: execution.stderr,
            final_code: code,
            artifacts: execution.produced_artifacts,
        };

        if let Some(logger) = &self.activity_logger {
            logger
                .log_session_complete(attempts_used, success, &result.final_code)
                .await;
        }

        if success {
            info!("Session {} verified after {} attempt(s)", session_id, attempts_used);
        } else {
            warn!("Session {} failed after {} attempt(s)", session_id, attempts_used);
        }

        SessionOutcome {
            session_id,
            verdict,
            attempts_used,
            failure_reason,
            final_attempt,
            result,
        }
    }

    async fn perform(&self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Notify {
                    stage,
                    message,
                    progress,
                } => self.status.notify(StatusUpdate::new(stage, message, progress)),
                Action::LogActivity { message } => {
                    debug!("{}", message);
                    if let Some(logger) = &self.activity_logger {
                        logger.log_event(&message).await;
                    }
                }
            }
        }
    }
}
