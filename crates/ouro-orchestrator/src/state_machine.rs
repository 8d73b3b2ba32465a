//! Pure state machine for the reflexion loop
//!
//! This module has NO I/O. The controller does the work for the current
//! state, reports the outcome as an [`Event`] and performs the [`Action`]s
//! the transition returns.
//!
//! - Pure function: transition(state, event) -> (state, actions)
//! - Invalid transitions go to `DoneFail` (never panic)
//! - `attempt` is the zero-based reflexion attempt the state belongs to

use ouro_core::{Stage, Verdict};

/// Loop state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    /// Building the prompt for this attempt
    Compose { attempt: usize },
    /// Waiting on the model cascade
    Generate { attempt: usize },
    /// Running the generated program
    Execute { attempt: usize },
    /// Self-healing a failed run
    Heal { attempt: usize },
    /// Checking the run produced output
    Verify { attempt: usize },
    /// Verified output
    DoneSuccess { attempt: usize },
    /// Budget exhausted or the loop broke
    DoneFail { reason: String },
}

impl State {
    pub fn initial() -> Self {
        Self::Compose { attempt: 0 }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::DoneSuccess { .. } | Self::DoneFail { .. })
    }

    pub fn attempt(&self) -> Option<usize> {
        match self {
            Self::Compose { attempt }
            | Self::Generate { attempt }
            | Self::Execute { attempt }
            | Self::Heal { attempt }
            | Self::Verify { attempt }
            | Self::DoneSuccess { attempt } => Some(*attempt),
            Self::DoneFail { .. } => None,
        }
    }
}

/// Outcome of the work done in a state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Prompt built
    PromptReady,
    /// Cascade returned code (`model_id` is `None` for the sentinel)
    CodeReady { model_id: Option<String> },
    /// Program finished; `remediable` when a healing rule matches
    ExecutionFinished { exit_code: i32, remediable: bool },
    /// Healer done
    HealFinished { actions: usize },
    /// Verifier judged the run; `budget_exhausted` once the failure counter
    /// has passed `max_reflexion`
    Verified {
        verdict: Verdict,
        budget_exhausted: bool,
    },
    /// Unrecoverable controller error
    Error { message: String },
}

/// Side effects requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Send a status notification
    Notify {
        stage: Stage,
        message: String,
        progress: u8,
    },
    /// Append to the activity log
    LogActivity { message: String },
}

fn notify(stage: Stage, message: impl Into<String>, progress: u8) -> Action {
    Action::Notify {
        stage,
        message: message.into(),
        progress,
    }
}

fn log(message: impl Into<String>) -> Action {
    Action::LogActivity {
        message: message.into(),
    }
}

/// Pure state transition function
///
/// Any invalid transition results in `DoneFail` with a descriptive reason.
pub fn transition(state: State, event: Event) -> (State, Vec<Action>) {
    match (state, event) {
        (_, Event::Error { message }) => {
            let actions = vec![
                log(format!("Loop error: {}", message)),
                notify(Stage::Complete, format!("Failed: {}", message), 100),
            ];
            (State::DoneFail { reason: message }, actions)
        }

        (State::Compose { attempt }, Event::PromptReady) => (
            State::Generate { attempt },
            vec![
                notify(
                    Stage::Compose,
                    format!("Prompt ready (attempt {})", attempt + 1),
                    10,
                ),
                notify(
                    Stage::Generate,
                    format!("Generating code (attempt {})", attempt + 1),
                    20,
                ),
            ],
        ),

        (State::Generate { attempt }, Event::CodeReady { model_id }) => {
            let message = match model_id {
                Some(model) => format!("Code generated by {}", model),
                None => "All models failed; running diagnostic program".to_string(),
            };
            (
                State::Execute { attempt },
                vec![log(message), notify(Stage::Execute, "Executing program...", 50)],
            )
        }

        (
            State::Execute { attempt },
            Event::ExecutionFinished {
                exit_code,
                remediable: true,
            },
        ) if exit_code != 0 => (
            State::Heal { attempt },
            vec![notify(
                Stage::Heal,
                format!("Exit code {}, self-healing...", exit_code),
                60,
            )],
        ),

        (State::Execute { attempt }, Event::ExecutionFinished { .. }) => (
            State::Verify { attempt },
            vec![notify(Stage::Verify, "Verifying output...", 80)],
        ),

        (State::Heal { attempt }, Event::HealFinished { actions }) => (
            State::Verify { attempt },
            vec![
                log(format!("Applied {} heal action(s)", actions)),
                notify(Stage::Verify, "Verifying output...", 80),
            ],
        ),

        (
            State::Verify { attempt },
            Event::Verified {
                verdict: Verdict::Success,
                ..
            },
        ) => (
            State::DoneSuccess { attempt },
            vec![
                log(format!("Attempt {} verified", attempt + 1)),
                notify(Stage::Complete, "Verification complete", 100),
            ],
        ),

        (
            State::Verify { attempt },
            Event::Verified {
                verdict,
                budget_exhausted: true,
            },
        ) => {
            let reason = format!(
                "Reflexion budget exhausted after {} attempts (last verdict: {})",
                attempt + 1,
                verdict
            );
            (
                State::DoneFail {
                    reason: reason.clone(),
                },
                vec![log(reason.clone()), notify(Stage::Complete, reason, 100)],
            )
        }

        (
            State::Verify { attempt },
            Event::Verified {
                verdict,
                budget_exhausted: false,
            },
        ) => {
            let next = attempt + 1;
            (
                State::Compose { attempt: next },
                vec![
                    log(format!("Attempt {} failed ({}), retrying", attempt + 1, verdict)),
                    notify(
                        Stage::Reflexion,
                        format!("Reflexion {}: fixing {}...", next, verdict),
                        40,
                    ),
                ],
            )
        }

        // Invalid transitions
        (state, event) => {
            let reason = format!("Invalid transition from {:?} on {:?}", state, event);
            (State::DoneFail { reason: reason.clone() }, vec![log(reason)])
        }
    }
}
