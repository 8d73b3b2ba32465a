//! Output verification
//!
//! A clean exit is not enough: the program has to show its work, either on
//! stdout or as an artifact file on disk.

use ouro_core::{ExecutionResult, Verdict};

/// Error context fed back after a clean but silent run
pub const SILENT_FAILURE_MESSAGE: &str = "RUNTIME ERROR: SILENT FAILURE. The code ran successfully but produced NO OUTPUT (no print statements, no images). You MUST use print() to show the result.";

#[derive(Debug, Clone, Copy, Default)]
pub struct OutputVerifier;

impl OutputVerifier {
    pub fn new() -> Self {
        Self
    }

    pub fn verify(&self, result: &ExecutionResult) -> Verdict {
        if result.exit_code != 0 || result.timed_out {
            return Verdict::RuntimeFailure;
        }

        let has_stdout = !result.stdout.trim().is_empty();
        let has_artifact = result.produced_artifacts.iter().any(|p| p.exists());

        if has_stdout || has_artifact {
            Verdict::Success
        } else {
            Verdict::SilentFailure
        }
    }

    /// Error context for the next attempt; `None` on success
    pub fn error_context(&self, verdict: Verdict, result: &ExecutionResult) -> Option<String> {
        match verdict {
            Verdict::Success => None,
            Verdict::SilentFailure => Some(SILENT_FAILURE_MESSAGE.to_string()),
            Verdict::RuntimeFailure => Some(result.stderr.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_stdout_is_success() {
        let result = ExecutionResult {
            stdout: "42\n".to_string(),
            ..Default::default()
        };
        assert_eq!(OutputVerifier::new().verify(&result), Verdict::Success);
    }

    #[test]
    fn test_whitespace_only_is_silent() {
        let verifier = OutputVerifier::new();
        let result = ExecutionResult {
            stdout: "  \n\t".to_string(),
            ..Default::default()
        };
        let verdict = verifier.verify(&result);
        assert_eq!(verdict, Verdict::SilentFailure);
        assert_eq!(
            verifier.error_context(verdict, &result).as_deref(),
            Some(SILENT_FAILURE_MESSAGE)
        );
    }

    #[test]
    fn test_artifact_on_disk_is_success() {
        let temp_dir = TempDir::new().unwrap();
        let plot = temp_dir.path().join("plot.png");
        std::fs::write(&plot, b"png").unwrap();

        let result = ExecutionResult {
            produced_artifacts: vec![plot],
            ..Default::default()
        };
        assert_eq!(OutputVerifier::new().verify(&result), Verdict::Success);
    }

    #[test]
    fn test_vanished_artifact_is_silent() {
        let temp_dir = TempDir::new().unwrap();
        let result = ExecutionResult {
            produced_artifacts: vec![temp_dir.path().join("gone.png")],
            ..Default::default()
        };
        assert_eq!(OutputVerifier::new().verify(&result), Verdict::SilentFailure);
    }

    #[test]
    fn test_nonzero_exit_is_runtime_failure() {
        let verifier = OutputVerifier::new();
        let result = ExecutionResult {
            exit_code: 1,
            stdout: "partial output".to_string(),
            stderr: "Traceback".to_string(),
            ..Default::default()
        };
        let verdict = verifier.verify(&result);
        assert_eq!(verdict, Verdict::RuntimeFailure);
        assert_eq!(
            verifier.error_context(verdict, &result).as_deref(),
            Some("Traceback")
        );
    }
}
