//! Activity log - human-readable session history in `.ouro/activity.md`
//!
//! Records, per session:
//! - The directive and the reflexion budget
//! - Each attempt: model, heal actions, verdict and an error preview
//! - Loop events from the state machine
//! - A final summary

use chrono::Utc;
use ouro_core::fail_open::fail_open;
use ouro_core::{AttemptRecord, Directive, Result, Verdict};
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Maximum characters of stdout/stderr quoted per attempt
const ACTIVITY_LOG_PREVIEW_CHARS: usize = 500;

/// Activity logger for reflexion sessions
pub struct ActivityLogger {
    ouro_dir: PathBuf,
    output_path: PathBuf,
}

fn preview(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() > ACTIVITY_LOG_PREVIEW_CHARS {
        let truncated: String = text.chars().take(ACTIVITY_LOG_PREVIEW_CHARS).collect();
        format!("{truncated}...")
    } else {
        text.to_string()
    }
}

fn quote(content: &mut String, text: &str) {
    content.push_str("> ");
    content.push_str(&preview(text).replace('\n', "\n> "));
    content.push_str("\n\n");
}

impl ActivityLogger {
    pub fn new(ouro_dir: PathBuf) -> Self {
        Self {
            output_path: ouro_dir.join("activity.md"),
            ouro_dir,
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.output_path
    }

    /// Start a new log for a session (truncates the previous one)
    pub async fn log_session_start(&self, session_id: &str, directive: &Directive, max_reflexion: usize) {
        fail_open("activity_logger::log_session_start", || async {
            tokio::fs::create_dir_all(&self.ouro_dir).await?;

            let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
            let content = format!(
                "# Ouro Activity Log\n\n## {} session {}\n**Directive**: {}\n**Started**: {}\n**Max Reflexion**: {}\n\n---\n\n",
                directive.mode(),
                session_id,
                directive.summary(),
                timestamp,
                max_reflexion
            );

            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.output_path)
                .await?;
            file.write_all(content.as_bytes()).await?;
            file.flush().await?;
            Ok(())
        })
        .await;
    }

    /// Record a finished attempt
    pub async fn log_attempt(&self, record: &AttemptRecord, max_reflexion: usize) {
        fail_open("activity_logger::log_attempt", || async {
            let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
            let mut content = String::new();

            content.push_str(&format!(
                "### Attempt {}/{}\n**Time**: {}\n",
                record.index + 1,
                max_reflexion + 1,
                timestamp
            ));
            content.push_str(&format!(
                "**Model**: {}\n",
                record
                    .generation
                    .model_id
                    .as_deref()
                    .unwrap_or("none (cascade exhausted)")
            ));
            content.push_str(&format!(
                "**Exit Code**: {}{}\n",
                record.execution.exit_code,
                if record.execution.timed_out { " (timed out)" } else { "" }
            ));

            if !record.heal_actions.is_empty() {
                content.push_str("**Heal Actions**:\n");
                for action in &record.heal_actions {
                    content.push_str(&format!("- {}\n", action));
                }
            }

            let icon = if record.verdict.is_success() { "✓" } else { "✗" };
            content.push_str(&format!("**Verdict**: {} {}\n\n", icon, record.verdict));

            match record.verdict {
                Verdict::Success => {
                    if !record.execution.stdout.trim().is_empty() {
                        content.push_str("**Output**:\n");
                        quote(&mut content, &record.execution.stdout);
                    }
                    if !record.execution.produced_artifacts.is_empty() {
                        content.push_str("**Artifacts**:\n");
                        for artifact in &record.execution.produced_artifacts {
                            content.push_str(&format!("- {}\n", artifact.display()));
                        }
                        content.push('\n');
                    }
                }
                Verdict::SilentFailure | Verdict::RuntimeFailure => {
                    if let Some(error) = record.failure() {
                        content.push_str("**Error**:\n");
                        quote(&mut content, &error.to_string());
                    }
                }
            }

            content.push_str("---\n\n");
            self.append_internal(&content).await
        })
        .await;
    }

    /// Record a loop event
    pub async fn log_event(&self, message: &str) {
        fail_open("activity_logger::log_event", || async {
            self.append_internal(&format!("- {}\n\n", message)).await
        })
        .await;
    }

    /// Log the session summary
    pub async fn log_session_complete(&self, attempts_used: usize, success: bool, final_code: &str) {
        fail_open("activity_logger::log_session_complete", || async {
            let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
            let (icon, text) = if success {
                ("✓", "Verified output")
            } else {
                ("✗", "Reflexion budget exhausted")
            };

            let content = format!(
                "## Session Summary\n\n\
                **Completed**: {}\n\
                **Attempts**: {}\n\
                **Result**: {} {}\n\
                **Final Code**: {} lines\n\n",
                timestamp,
                attempts_used,
                icon,
                text,
                final_code.lines().count()
            );

            self.append_internal(&content).await
        })
        .await;
    }

    async fn append_internal(&self, content: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.output_path)
            .await?;

        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ouro_core::{ExecutionResult, GenerationResult, HealAction};
    use tempfile::TempDir;
    use tokio::fs;

    fn record(verdict: Verdict, execution: ExecutionResult) -> AttemptRecord {
        AttemptRecord {
            index: 0,
            generation: GenerationResult::from_model("print(1)", "gemini-1.5-flash"),
            execution,
            final_code: "print(1)".to_string(),
            heal_actions: vec![HealAction::InjectImport {
                name: "math".to_string(),
            }],
            verdict,
        }
    }

    #[tokio::test]
    async fn test_session_start_creates_dir() {
        let temp_dir = TempDir::new().unwrap();
        let ouro_dir = temp_dir.path().join(".ouro");
        let logger = ActivityLogger::new(ouro_dir.clone());

        logger
            .log_session_start("abc123", &Directive::author("Plot a sine wave"), 5)
            .await;

        let content = fs::read_to_string(ouro_dir.join("activity.md")).await.unwrap();
        assert!(content.contains("# Ouro Activity Log"));
        assert!(content.contains("## author session abc123"));
        assert!(content.contains("**Directive**: Plot a sine wave"));
        assert!(content.contains("**Max Reflexion**: 5"));
    }

    #[tokio::test]
    async fn test_log_attempts() {
        let temp_dir = TempDir::new().unwrap();
        let logger = ActivityLogger::new(temp_dir.path().to_path_buf());

        logger
            .log_session_start("s1", &Directive::author("task"), 2)
            .await;
        logger
            .log_attempt(
                &record(
                    Verdict::RuntimeFailure,
                    ExecutionResult {
                        exit_code: 1,
                        stderr: "ZeroDivisionError: division by zero".to_string(),
                        ..Default::default()
                    },
                ),
                2,
            )
            .await;
        logger
            .log_attempt(
                &record(
                    Verdict::Success,
                    ExecutionResult {
                        stdout: "42".to_string(),
                        ..Default::default()
                    },
                ),
                2,
            )
            .await;
        logger.log_session_complete(2, true, "print(1)").await;

        let content = fs::read_to_string(logger.path()).await.unwrap();
        assert!(content.contains("### Attempt 1/3"));
        assert!(content.contains("**Model**: gemini-1.5-flash"));
        assert!(content.contains("- inject 'import math'"));
        assert!(content.contains("✗ runtime_failure"));
        assert!(content.contains("> Runtime failure: exit code 1: ZeroDivisionError"));
        assert!(content.contains("✓ success"));
        assert!(content.contains("> 42"));
        assert!(content.contains("**Attempts**: 2"));
    }

    #[tokio::test]
    async fn test_truncate_long_output() {
        let temp_dir = TempDir::new().unwrap();
        let logger = ActivityLogger::new(temp_dir.path().to_path_buf());

        logger
            .log_attempt(
                &record(
                    Verdict::Success,
                    ExecutionResult {
                        stdout: "x".repeat(1000),
                        ..Default::default()
                    },
                ),
                5,
            )
            .await;

        let content = fs::read_to_string(logger.path()).await.unwrap();
        assert!(content.contains("..."));
        assert!(!content.contains(&"x".repeat(600)));
    }

    #[tokio::test]
    async fn test_unwritable_location_fails_open() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        // Parent is a regular file, so every write fails; nothing panics
        let logger = ActivityLogger::new(blocker.join(".ouro"));
        logger
            .log_session_start("s", &Directive::author("task"), 1)
            .await;
        logger.log_event("still running").await;
        assert!(!logger.path().exists());
    }
}
