//! Sandboxed program execution
//!
//! The executor owns the script path and the artifact files in its working
//! directory. Every run sweeps old artifacts, overwrites the script, runs the
//! interpreter under a wall-clock limit and reports what happened. Nothing
//! here returns an error to the caller: failures become an
//! [`ExecutionResult`] so they can be fed back into the next attempt.

use crate::artifacts::{discover_artifacts, sweep_artifacts};
use async_trait::async_trait;
use ouro_core::{ExecutionResult, OuroError, Result, SandboxConfig};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

/// Stderr reported when a run hits the wall-clock limit
pub fn timeout_message(limit: Duration) -> String {
    format!("TIMEOUT: Execution exceeded {}s.", limit.as_secs())
}

/// Trait for running generated programs (allows mocking in tests)
#[async_trait]
pub trait CodeExecutor: Send {
    /// Run `code` and report the outcome. Exactly one result per call.
    async fn execute(&mut self, code: &str) -> ExecutionResult;
}

/// Runs programs as child processes in a working directory
#[derive(Debug, Clone)]
pub struct SandboxExecutor {
    work_dir: PathBuf,
    interpreter: String,
    script_name: String,
    timeout: Duration,
    extensions: Vec<String>,
}

impl SandboxExecutor {
    /// Executor with default settings
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self::from_config(work_dir, &SandboxConfig::default())
    }

    pub fn from_config(work_dir: impl Into<PathBuf>, config: &SandboxConfig) -> Self {
        Self {
            work_dir: work_dir.into(),
            interpreter: config.interpreter.clone(),
            script_name: config.script_name.clone(),
            timeout: config.timeout(),
            extensions: config.artifact_extensions.clone(),
        }
    }

    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    pub fn script_path(&self) -> PathBuf {
        self.work_dir.join(&self.script_name)
    }

    /// Remove artifacts and the script file (hard reset)
    pub fn clean(&self) -> usize {
        sweep_artifacts(&self.work_dir, &self.extensions, &self.script_name)
    }

    async fn try_execute(&self, code: &str) -> Result<ExecutionResult> {
        tokio::fs::create_dir_all(&self.work_dir).await?;
        self.clean();

        let script = self.script_path();
        tokio::fs::write(&script, code).await?;

        let mut command = Command::new(&self.interpreter);
        command
            .arg(&self.script_name)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(output) => output.map_err(|e| {
                OuroError::Runtime(format!("Failed to start {}: {}", self.interpreter, e))
            })?,
            Err(_) => return Err(OuroError::Timeout(self.timeout.as_secs())),
        };

        let produced_artifacts = discover_artifacts(&self.work_dir, &self.extensions)?;

        Ok(ExecutionResult {
            // Killed by a signal: no exit code
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            timed_out: false,
            produced_artifacts,
        })
    }
}

#[async_trait]
impl CodeExecutor for SandboxExecutor {
    #[instrument(skip(self, code), fields(dir = %self.work_dir.display(), code_chars = code.len()))]
    async fn execute(&mut self, code: &str) -> ExecutionResult {
        match self.try_execute(code).await {
            Ok(result) => {
                debug!(
                    "Exit code {} ({} stdout bytes, {} artifacts)",
                    result.exit_code,
                    result.stdout.len(),
                    result.produced_artifacts.len()
                );
                result
            }
            Err(OuroError::Timeout(secs)) => {
                warn!("Execution killed after {}s", secs);
                ExecutionResult {
                    exit_code: -1,
                    stderr: timeout_message(self.timeout),
                    timed_out: true,
                    ..Default::default()
                }
            }
            Err(e) => {
                warn!("Execution failed: {}", e);
                ExecutionResult::failure(e.to_string())
            }
        }
    }
}

/// Mock executor for testing
///
/// Returns queued results in order and records every program it was asked
/// to run. An empty queue yields a failure result.
#[derive(Debug, Default)]
pub struct MockExecutor {
    results: VecDeque<ExecutionResult>,
    executed: Vec<String>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a result for the next call
    pub fn with_result(mut self, result: ExecutionResult) -> Self {
        self.results.push_back(result);
        self
    }

    /// Queue a clean exit with `stdout`
    pub fn with_output(self, stdout: &str) -> Self {
        self.with_result(ExecutionResult {
            stdout: stdout.to_string(),
            ..Default::default()
        })
    }

    /// Queue a failed exit with `stderr`
    pub fn with_error(self, stderr: &str) -> Self {
        self.with_result(ExecutionResult {
            exit_code: 1,
            stderr: stderr.to_string(),
            ..Default::default()
        })
    }

    /// Programs run so far, in order
    pub fn executed(&self) -> &[String] {
        &self.executed
    }
}

#[async_trait]
impl CodeExecutor for MockExecutor {
    async fn execute(&mut self, code: &str) -> ExecutionResult {
        self.executed.push(code.to_string());
        self.results
            .pop_front()
            .unwrap_or_else(|| ExecutionResult::failure("No mock result queued"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sh_executor(dir: &Path) -> SandboxExecutor {
        SandboxExecutor::new(dir)
            .with_interpreter("sh")
            .with_timeout(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_captures_stdout_and_exit_code() {
        let temp_dir = TempDir::new().unwrap();
        let mut executor = sh_executor(temp_dir.path());

        let result = executor.execute("echo hello\necho oops >&2\nexit 3\n").await;
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.stdout.trim(), "hello");
        assert_eq!(result.stderr.trim(), "oops");
        assert!(!result.timed_out);
    }

    #[tokio::test]
    async fn test_script_is_overwritten() {
        let temp_dir = TempDir::new().unwrap();
        let mut executor = sh_executor(temp_dir.path());

        executor.execute("echo first\necho second\n").await;
        let result = executor.execute("echo third\n").await;

        assert_eq!(result.stdout.trim(), "third");
        let script = std::fs::read_to_string(executor.script_path()).unwrap();
        assert_eq!(script, "echo third\n");
    }

    #[tokio::test]
    async fn test_old_artifacts_are_swept() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("stale.png"), b"old").unwrap();
        let mut executor = sh_executor(temp_dir.path());

        let result = executor.execute("echo fresh > fresh.png\n").await;
        assert!(result.succeeded());
        assert_eq!(result.produced_artifacts, vec![temp_dir.path().join("fresh.png")]);
        assert!(!temp_dir.path().join("stale.png").exists());
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let temp_dir = TempDir::new().unwrap();
        let mut executor = SandboxExecutor::new(temp_dir.path())
            .with_interpreter("sh")
            .with_timeout(Duration::from_secs(1));

        let started = std::time::Instant::now();
        let result = executor.execute("sleep 10\n").await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(result.timed_out);
        assert_eq!(result.exit_code, -1);
        assert_eq!(result.stderr, "TIMEOUT: Execution exceeded 1s.");
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_failure_result() {
        let temp_dir = TempDir::new().unwrap();
        let mut executor =
            SandboxExecutor::new(temp_dir.path()).with_interpreter("ouro-no-such-interpreter");

        let result = executor.execute("print(1)").await;
        assert_eq!(result.exit_code, -1);
        assert!(result.stderr.contains("Failed to start"));
    }

    #[tokio::test]
    async fn test_mock_executor() {
        let mut executor = MockExecutor::new().with_output("42").with_error("boom");

        assert_eq!(executor.execute("a").await.stdout, "42");
        assert_eq!(executor.execute("b").await.exit_code, 1);
        assert_eq!(executor.execute("c").await.exit_code, -1);
        assert_eq!(executor.executed(), &["a", "b", "c"]);
    }
}
