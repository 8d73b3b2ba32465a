//! # ouro-core
//!
//! Core types for the Ouro closed-loop code-synthesis orchestrator.
//!
//! Ouro asks a text-generation provider for a program, runs it in a child
//! process, heals common failures and feeds whatever still fails back into
//! the next generation request until the run produces visible output.
//!
//! This crate holds what every layer shares:
//! - The session data model (directives, requests, results, verdicts)
//! - The error taxonomy
//! - Configuration loaded from `.ouro/config.toml`
//! - Status notifications and fail-open helpers

mod config;
mod error;
pub mod fail_open;
mod status;
mod types;

pub use config::{
    CascadeConfig, HealingConfig, OuroConfig, ReflexionConfig, SandboxConfig, OURO_DIR,
};
pub use error::{OuroError, Result};
pub use status::{RecordingStatusSink, Stage, StatusSink, StatusUpdate, TracingStatusSink};
pub use types::*;
