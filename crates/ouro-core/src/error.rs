//! Unified error types for Ouro

use thiserror::Error;

/// Unified error type for all Ouro operations
#[derive(Error, Debug)]
pub enum OuroError {
    // Provider errors
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Generation exhausted: {0}")]
    GenerationExhausted(String),

    // Execution errors
    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("Execution timed out after {0}s")]
    Timeout(u64),

    #[error("Runtime failure: {0}")]
    Runtime(String),

    #[error("Program exited cleanly but produced no output")]
    SilentSuccess,

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

/// Result type alias using OuroError
pub type Result<T> = std::result::Result<T, OuroError>;
