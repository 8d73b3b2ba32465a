//! Core type definitions for the Ouro generation loop

use crate::OuroError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The user's request for a session. Created once and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Directive {
    /// Write a new program from a natural-language task
    Author { task_text: String },
    /// Fix an existing program given the error it produced
    Repair {
        broken_code: String,
        error_text: String,
    },
}

impl Directive {
    pub fn author(task_text: impl Into<String>) -> Self {
        Self::Author {
            task_text: task_text.into(),
        }
    }

    pub fn repair(broken_code: impl Into<String>, error_text: impl Into<String>) -> Self {
        Self::Repair {
            broken_code: broken_code.into(),
            error_text: error_text.into(),
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            Self::Author { .. } => Mode::Author,
            Self::Repair { .. } => Mode::Repair,
        }
    }

    /// Short human-readable summary (first line of the task or error)
    pub fn summary(&self) -> &str {
        let text = match self {
            Self::Author { task_text } => task_text.as_str(),
            Self::Repair { error_text, .. } => error_text.as_str(),
        };
        text.lines().next().unwrap_or(text).trim()
    }
}

/// Generation mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Author,
    Repair,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Author => write!(f, "author"),
            Self::Repair => write!(f, "repair"),
        }
    }
}

/// Input to the prompt composer, built fresh for every reflexion iteration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Original task text (empty for repair directives)
    pub task_text: String,
    pub mode: Mode,
    /// Error text the new program must fix
    pub prior_error_context: Option<String>,
    /// Code that produced `prior_error_context`
    pub prior_code: Option<String>,
    /// 0 for the first request of a session
    pub reflexion_attempt: usize,
}

impl GenerationRequest {
    /// First request of a session, straight from the directive
    pub fn from_directive(directive: &Directive) -> Self {
        match directive {
            Directive::Author { task_text } => Self {
                task_text: task_text.clone(),
                mode: Mode::Author,
                ..Default::default()
            },
            Directive::Repair {
                broken_code,
                error_text,
            } => Self {
                task_text: String::new(),
                mode: Mode::Repair,
                prior_error_context: Some(error_text.clone()),
                prior_code: Some(broken_code.clone()),
                reflexion_attempt: 0,
            },
        }
    }

    /// Repair request seeded with the previous attempt's own output
    pub fn reflexion(
        directive: &Directive,
        last_code: &str,
        last_error: &str,
        reflexion_attempt: usize,
    ) -> Self {
        let task_text = match directive {
            Directive::Author { task_text } => task_text.clone(),
            Directive::Repair { .. } => String::new(),
        };

        Self {
            task_text,
            mode: Mode::Repair,
            prior_error_context: Some(last_error.to_string()),
            prior_code: Some(last_code.to_string()),
            reflexion_attempt,
        }
    }
}

/// Program text returned by the model cascade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub source_code: String,
    /// Model that produced the code; `None` for the exhaustion sentinel
    pub model_id: Option<String>,
}

impl GenerationResult {
    pub fn from_model(source_code: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            source_code: source_code.into(),
            model_id: Some(model_id.into()),
        }
    }

    /// Sentinel program that prints `message` when executed
    pub fn sentinel(message: &str) -> Self {
        Self {
            source_code: format!("print({})", python_string_literal(message)),
            model_id: None,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.model_id.is_none()
    }
}

/// Quote `text` as a double-quoted Python string literal
pub fn python_string_literal(text: &str) -> String {
    let mut literal = String::with_capacity(text.len() + 2);
    literal.push('"');
    for c in text.chars() {
        match c {
            '\\' => literal.push_str("\\\\"),
            '"' => literal.push_str("\\\""),
            '\n' => literal.push_str("\\n"),
            '\r' => literal.push_str("\\r"),
            '\t' => literal.push_str("\\t"),
            c if c.is_control() => literal.push_str(&format!("\\x{:02x}", c as u32 & 0xff)),
            c => literal.push(c),
        }
    }
    literal.push('"');
    literal
}

/// Outcome of a single sandbox execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    /// Artifact files found after the run, in discovery order
    pub produced_artifacts: Vec<PathBuf>,
}

impl ExecutionResult {
    /// A failed result carrying only an error message
    pub fn failure(stderr: impl Into<String>) -> Self {
        Self {
            exit_code: -1,
            stderr: stderr.into(),
            ..Default::default()
        }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }
}

/// Automated remediation applied by the self-healer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HealAction {
    /// Install the package that provides a missing module
    InstallDependency {
        import_name: String,
        package_name: String,
    },
    /// Prepend `import <name>` to the program
    InjectImport { name: String },
    /// Replace a bare `import <from>` with the qualified import `to`
    RewriteAliasImport { from: String, to: String },
}

impl std::fmt::Display for HealAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InstallDependency {
                import_name,
                package_name,
            } => write!(f, "install {} (for '{}')", package_name, import_name),
            Self::InjectImport { name } => write!(f, "inject 'import {}'", name),
            Self::RewriteAliasImport { from, to } => {
                write!(f, "rewrite 'import {}' -> '{}'", from, to)
            }
        }
    }
}

/// Verifier judgement on an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Success,
    SilentFailure,
    RuntimeFailure,
}

impl Verdict {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::SilentFailure => write!(f, "silent_failure"),
            Self::RuntimeFailure => write!(f, "runtime_failure"),
        }
    }
}

/// Everything that happened in one reflexion iteration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub index: usize,
    pub generation: GenerationResult,
    pub execution: ExecutionResult,
    /// Code that actually ran last (after any heal rewrites)
    pub final_code: String,
    pub heal_actions: Vec<HealAction>,
    pub verdict: Verdict,
}

impl AttemptRecord {
    /// Error describing why this attempt did not succeed
    pub fn failure(&self) -> Option<OuroError> {
        match self.verdict {
            Verdict::Success => None,
            Verdict::SilentFailure => Some(OuroError::SilentSuccess),
            Verdict::RuntimeFailure if self.execution.timed_out => {
                Some(OuroError::Runtime(self.execution.stderr.clone()))
            }
            Verdict::RuntimeFailure => Some(OuroError::Runtime(format!(
                "exit code {}: {}",
                self.execution.exit_code,
                self.execution.stderr.trim()
            ))),
        }
    }
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalVerdict {
    Success,
    Fail,
}

/// Mutable loop state of one session
#[derive(Debug, Clone)]
pub struct SessionState {
    pub directive: Directive,
    pub reflexion_attempt: usize,
    pub max_reflexion: usize,
    pub last_error_context: Option<String>,
    pub last_code: Option<String>,
    pub terminal_verdict: Option<TerminalVerdict>,
}

impl SessionState {
    pub fn new(directive: Directive, max_reflexion: usize) -> Self {
        Self {
            directive,
            reflexion_attempt: 0,
            max_reflexion,
            last_error_context: None,
            last_code: None,
            terminal_verdict: None,
        }
    }

    /// Request for the current iteration
    pub fn next_request(&self) -> GenerationRequest {
        match (&self.last_code, &self.last_error_context) {
            (Some(code), Some(error)) if self.reflexion_attempt > 0 => {
                GenerationRequest::reflexion(&self.directive, code, error, self.reflexion_attempt)
            }
            _ => GenerationRequest::from_directive(&self.directive),
        }
    }

    /// Record a failed attempt's feedback and advance the counter
    pub fn record_failure(&mut self, code: &str, error_context: &str) {
        self.last_code = Some(code.to_string());
        self.last_error_context = Some(error_context.to_string());
        self.reflexion_attempt += 1;
    }

    pub fn budget_exhausted(&self) -> bool {
        self.reflexion_attempt > self.max_reflexion
    }
}

/// Result record handed to the presentation layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub final_code: String,
    pub artifacts: Vec<PathBuf>,
}

impl RunResult {
    /// Whether the output mentions a provider quota error (HTTP 429)
    pub fn mentions_rate_limit(&self) -> bool {
        self.stdout.contains("429") || self.stderr.contains("429")
    }
}
