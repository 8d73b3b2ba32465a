//! # ouro-orchestrator
//!
//! The reflexion loop: compose a prompt, generate code, run it, heal it,
//! verify it, and feed whatever failed into the next attempt.
//!
//! - [`compose`] builds prompts from a [`ouro_core::GenerationRequest`]
//! - [`state_machine`] holds the pure transition function
//! - [`ReflexionController`] performs the side effects
//! - [`ActivityLogger`] writes `.ouro/activity.md`

mod activity_logger;
mod controller;
mod prompt;
pub mod state_machine;

pub use activity_logger::ActivityLogger;
pub use controller::{ReflexionController, SessionOutcome};
pub use prompt::compose;
