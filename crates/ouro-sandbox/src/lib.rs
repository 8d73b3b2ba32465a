//! # ouro-sandbox
//!
//! Runs generated programs and decides what their runs mean.
//!
//! - [`SandboxExecutor`] owns the script file and artifacts in a working
//!   directory and runs the interpreter under a timeout
//! - [`SelfHealer`] fixes missing dependencies and imports, then re-runs
//! - [`OutputVerifier`] rejects runs that exit cleanly without output

mod artifacts;
mod executor;
mod healer;
mod installer;
mod verifier;

pub use artifacts::{discover_artifacts, sweep_artifacts};
pub use executor::{timeout_message, CodeExecutor, MockExecutor, SandboxExecutor};
pub use healer::{
    classify, install_failure_message, is_remediable, rewrite_alias_import, HealOutcome,
    SelfHealer, MAX_RETRIES_MESSAGE,
};
pub use installer::{MockInstaller, PackageInstaller, PipInstaller};
pub use verifier::{OutputVerifier, SILENT_FAILURE_MESSAGE};
