//! Self-healing of failed executions
//!
//! A failed run's stderr is matched against an ordered rule set. The first
//! matching rule yields a [`HealAction`]; the healer applies it and runs the
//! program again, up to `healing.max_attempts` times. Errors no rule knows
//! are handed back untouched for the reflexion loop to deal with.

use crate::executor::CodeExecutor;
use crate::installer::PackageInstaller;
use ouro_core::{
    ExecutionResult, HealAction, HealingConfig, Stage, StatusSink, StatusUpdate,
    TracingStatusSink,
};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

/// Stderr reported once the remediation budget is spent
pub const MAX_RETRIES_MESSAGE: &str = "Max retries exceeded during self-healing.";

/// Stderr reported when a missing dependency cannot be installed
pub fn install_failure_message(import_name: &str, package_name: &str) -> String {
    format!(
        "CRITICAL ERROR: The module '{}' (package: {}) FAILED to install.\n\
         It likely does not exist or is incompatible.\n\
         ACTION: Rewrite code to NOT use '{}'.",
        import_name, package_name, import_name
    )
}

struct Rules {
    missing_module: Regex,
    undefined_name: Regex,
    /// `import <name>` with an optional comment or `;`/`,` tail
    bare_import: Regex,
}

fn rules() -> Option<&'static Rules> {
    static RULES: OnceLock<Option<Rules>> = OnceLock::new();
    RULES
        .get_or_init(|| {
            Some(Rules {
                missing_module: Regex::new(r"No module named '([\w.]+)'").ok()?,
                undefined_name: Regex::new(r"name '(\w+)' is not defined").ok()?,
                bare_import: Regex::new(r"^(\s*)import\s+(\w+)(\s*(?:[#;,].*)?)$").ok()?,
            })
        })
        .as_ref()
}

/// Lowercase with no underscore: probably a module the program forgot to
/// import rather than a variable it forgot to define
fn looks_like_module(name: &str) -> bool {
    name.chars().any(char::is_alphabetic)
        && !name.chars().any(char::is_uppercase)
        && !name.contains('_')
}

/// Map stderr to the first matching remediation, if any
pub fn classify(stderr: &str, config: &HealingConfig) -> Option<HealAction> {
    let rules = rules()?;

    if let Some(caps) = rules.missing_module.captures(stderr) {
        let full = caps.get(1)?.as_str();
        let name = full.split('.').next().unwrap_or(full);

        if let Some(line) = config.import_aliases.get(name) {
            return Some(HealAction::RewriteAliasImport {
                from: name.to_string(),
                to: line.clone(),
            });
        }

        let package = config
            .package_aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string());
        return Some(HealAction::InstallDependency {
            import_name: name.to_string(),
            package_name: package,
        });
    }

    if let Some(caps) = rules.undefined_name.captures(stderr) {
        let name = caps.get(1)?.as_str();
        if looks_like_module(name) {
            return Some(HealAction::InjectImport {
                name: name.to_string(),
            });
        }
    }

    None
}

/// Whether a result is a failure some rule can act on
pub fn is_remediable(result: &ExecutionResult, config: &HealingConfig) -> bool {
    result.exit_code != 0 && !result.timed_out && classify(&result.stderr, config).is_some()
}

/// Replace every bare `import <from>` statement with `to`, keeping the
/// indentation and any trailing comment or separator. Returns `None` when no
/// line matched.
pub fn rewrite_alias_import(code: &str, from: &str, to: &str) -> Option<String> {
    let bare_import = &rules()?.bare_import;
    let mut changed = false;

    let lines: Vec<String> = code
        .split('\n')
        .map(|line| match bare_import.captures(line) {
            Some(caps) if &caps[2] == from => {
                changed = true;
                format!("{}{}{}", &caps[1], to, &caps[3])
            }
            _ => line.to_string(),
        })
        .collect();

    changed.then(|| lines.join("\n"))
}

/// Failed result carrying only the healer's diagnostic (no stdout, no artifacts)
fn terminal_result(exit_code: i32, stderr: impl Into<String>) -> ExecutionResult {
    ExecutionResult {
        exit_code,
        stderr: stderr.into(),
        ..Default::default()
    }
}

/// Result of a healing pass
#[derive(Debug, Clone)]
pub struct HealOutcome {
    /// Result of the last execution (or the input result if nothing ran)
    pub result: ExecutionResult,
    /// Code that produced `result`
    pub code: String,
    pub actions: Vec<HealAction>,
}

/// Applies remediation rules and re-runs programs
pub struct SelfHealer<I: PackageInstaller> {
    installer: I,
    config: HealingConfig,
    status: Arc<dyn StatusSink>,
}

impl<I: PackageInstaller> SelfHealer<I> {
    pub fn new(installer: I, config: HealingConfig) -> Self {
        Self {
            installer,
            config,
            status: Arc::new(TracingStatusSink),
        }
    }

    pub fn with_status_sink(mut self, status: Arc<dyn StatusSink>) -> Self {
        self.status = status;
        self
    }

    pub fn installer(&self) -> &I {
        &self.installer
    }

    pub fn config(&self) -> &HealingConfig {
        &self.config
    }

    pub fn is_remediable(&self, result: &ExecutionResult) -> bool {
        is_remediable(result, &self.config)
    }

    /// Heal `result` (produced by `code`), re-running through `executor`
    pub async fn heal<E>(&self, executor: &mut E, code: &str, result: ExecutionResult) -> HealOutcome
    where
        E: CodeExecutor + ?Sized,
    {
        let mut code = code.to_string();
        let mut result = result;
        let mut actions = Vec::new();
        let mut cycles = 0;

        loop {
            if result.exit_code == 0 || result.timed_out {
                break;
            }
            let Some(action) = classify(&result.stderr, &self.config) else {
                debug!("No healing rule matches");
                break;
            };

            if cycles >= self.config.max_attempts {
                warn!("Self-healing gave up after {} attempts", cycles);
                result = terminal_result(result.exit_code, MAX_RETRIES_MESSAGE);
                break;
            }

            self.status.notify(StatusUpdate::new(
                Stage::Heal,
                format!("Healing: {}", action),
                60,
            ));

            match &action {
                HealAction::InstallDependency {
                    import_name,
                    package_name,
                } => {
                    if let Err(e) = self.installer.install(package_name).await {
                        warn!("Could not install {}: {}", package_name, e);
                        result = terminal_result(
                            result.exit_code,
                            install_failure_message(import_name, package_name),
                        );
                        actions.push(action);
                        break;
                    }
                }
                HealAction::InjectImport { name } => {
                    code = format!("import {}\n{}", name, code);
                }
                HealAction::RewriteAliasImport { from, to } => {
                    match rewrite_alias_import(&code, from, to) {
                        Some(rewritten) => code = rewritten,
                        None => {
                            debug!("No bare 'import {}' to rewrite", from);
                            break;
                        }
                    }
                }
            }

            info!("Applied {}, re-running", action);
            actions.push(action);
            cycles += 1;
            result = executor.execute(&code).await;
        }

        HealOutcome {
            result,
            code,
            actions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::MockExecutor;
    use crate::installer::MockInstaller;

    fn failed(stderr: &str) -> ExecutionResult {
        ExecutionResult {
            exit_code: 1,
            stderr: stderr.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_classify_missing_module_uses_alias_table() {
        let config = HealingConfig::default();
        let action = classify(
            "ModuleNotFoundError: No module named 'sklearn'",
            &config,
        );
        assert_eq!(
            action,
            Some(HealAction::InstallDependency {
                import_name: "sklearn".to_string(),
                package_name: "scikit-learn".to_string(),
            })
        );
    }

    #[test]
    fn test_classify_dotted_module_uses_top_level() {
        let config = HealingConfig::default();
        let action = classify("No module named 'skimage.filters'", &config);
        assert_eq!(
            action,
            Some(HealAction::InstallDependency {
                import_name: "skimage".to_string(),
                package_name: "scikit-image".to_string(),
            })
        );
    }

    #[test]
    fn test_classify_unknown_module_installs_same_name() {
        let config = HealingConfig::default();
        assert_eq!(
            classify("No module named 'requests'", &config),
            Some(HealAction::InstallDependency {
                import_name: "requests".to_string(),
                package_name: "requests".to_string(),
            })
        );
    }

    #[test]
    fn test_classify_plt_is_rewrite_not_install() {
        let config = HealingConfig::default();
        assert_eq!(
            classify("No module named 'plt'", &config),
            Some(HealAction::RewriteAliasImport {
                from: "plt".to_string(),
                to: "import matplotlib.pyplot as plt".to_string(),
            })
        );
    }

    #[test]
    fn test_classify_undefined_name_heuristic() {
        let config = HealingConfig::default();
        assert_eq!(
            classify("NameError: name 'math' is not defined", &config),
            Some(HealAction::InjectImport {
                name: "math".to_string()
            })
        );
        assert_eq!(classify("NameError: name 'my_var' is not defined", &config), None);
        assert_eq!(classify("NameError: name 'Foo' is not defined", &config), None);
        assert_eq!(classify("ZeroDivisionError: division by zero", &config), None);
    }

    #[test]
    fn test_rewrite_alias_import_only_bare_lines() {
        let code = "import numpy as np\nimport plt\ndef f():\n    import plt\nx = 'import plt'\n";
        let rewritten = rewrite_alias_import(code, "plt", "import matplotlib.pyplot as plt").unwrap();
        assert_eq!(
            rewritten,
            "import numpy as np\nimport matplotlib.pyplot as plt\ndef f():\n    import matplotlib.pyplot as plt\nx = 'import plt'\n"
        );
        assert!(rewrite_alias_import("import numpy", "plt", "x").is_none());
        assert!(rewrite_alias_import("import plt.pyplot", "plt", "x").is_none());
    }

    #[test]
    fn test_rewrite_alias_import_keeps_comment() {
        let rewritten = rewrite_alias_import(
            "import plt  # plotting\nplt.plot([1])\n",
            "plt",
            "import matplotlib.pyplot as plt",
        )
        .unwrap();
        assert_eq!(
            rewritten,
            "import matplotlib.pyplot as plt  # plotting\nplt.plot([1])\n"
        );
    }

    #[test]
    fn test_rewrite_alias_import_trailing_separators() {
        let to = "import matplotlib.pyplot as plt";
        assert_eq!(
            rewrite_alias_import("import plt;", "plt", to).as_deref(),
            Some("import matplotlib.pyplot as plt;")
        );
        assert_eq!(
            rewrite_alias_import("import plt, numpy", "plt", to).as_deref(),
            Some("import matplotlib.pyplot as plt, numpy")
        );
        assert_eq!(
            rewrite_alias_import("  import   plt\r\nx = 1", "plt", to).as_deref(),
            Some("  import matplotlib.pyplot as plt\r\nx = 1")
        );
    }

    #[tokio::test]
    async fn test_install_then_rerun_same_code() {
        let healer = SelfHealer::new(MockInstaller::new(), HealingConfig::default());
        let mut executor = MockExecutor::new().with_output("accuracy: 0.9");
        let code = "import sklearn\nprint('accuracy: 0.9')";

        let outcome = healer
            .heal(&mut executor, code, failed("No module named 'sklearn'"))
            .await;

        assert_eq!(outcome.result.exit_code, 0);
        assert_eq!(outcome.code, code);
        assert_eq!(executor.executed(), &[code]);
        assert_eq!(healer.installer().requested(), vec!["scikit-learn"]);
    }

    #[tokio::test]
    async fn test_install_failure_stops_immediately() {
        let healer = SelfHealer::new(
            MockInstaller::new().with_failure("scikit-learn"),
            HealingConfig::default(),
        );
        let mut executor = MockExecutor::new();

        let outcome = healer
            .heal(&mut executor, "import sklearn", failed("No module named 'sklearn'"))
            .await;

        assert!(executor.executed().is_empty());
        assert_ne!(outcome.result.exit_code, 0);
        assert!(outcome.result.stdout.is_empty());
        assert!(outcome.result.produced_artifacts.is_empty());
        assert!(outcome.result.stderr.starts_with("CRITICAL ERROR"));
        assert!(outcome.result.stderr.contains("'sklearn'"));
        assert!(outcome
            .result
            .stderr
            .contains("ACTION: Rewrite code to NOT use 'sklearn'."));
    }

    #[tokio::test]
    async fn test_inject_import() {
        let healer = SelfHealer::new(MockInstaller::new(), HealingConfig::default());
        let mut executor = MockExecutor::new().with_output("3.14");

        let outcome = healer
            .heal(
                &mut executor,
                "print(math.pi)",
                failed("NameError: name 'math' is not defined"),
            )
            .await;

        assert_eq!(outcome.code, "import math\nprint(math.pi)");
        assert_eq!(outcome.actions.len(), 1);
        assert!(healer.installer().requested().is_empty());
    }

    #[tokio::test]
    async fn test_unmatched_error_is_untouched() {
        let healer = SelfHealer::new(MockInstaller::new(), HealingConfig::default());
        let mut executor = MockExecutor::new();
        let input = failed("ZeroDivisionError: division by zero");

        let outcome = healer.heal(&mut executor, "1/0", input.clone()).await;

        assert_eq!(outcome.result, input);
        assert!(outcome.actions.is_empty());
        assert!(executor.executed().is_empty());
    }

    #[tokio::test]
    async fn test_sub_attempt_bound() {
        let healer = SelfHealer::new(MockInstaller::new(), HealingConfig::default());
        let mut executor = MockExecutor::new()
            .with_error("No module named 'a'")
            .with_error("No module named 'b'")
            .with_result(ExecutionResult {
                exit_code: 1,
                stdout: "loaded a, b".to_string(),
                stderr: "No module named 'c'".to_string(),
                ..Default::default()
            })
            .with_error("No module named 'd'");

        let outcome = healer
            .heal(&mut executor, "import a", failed("No module named 'z'"))
            .await;

        assert_eq!(executor.executed().len(), 3);
        assert_eq!(healer.installer().requested(), vec!["z", "a", "b"]);
        assert_eq!(outcome.result.stderr, MAX_RETRIES_MESSAGE);
        assert!(outcome.result.stdout.is_empty());
        assert_eq!(outcome.actions.len(), 3);
    }

    #[tokio::test]
    async fn test_terminal_heal_result_drops_stale_output() {
        let healer = SelfHealer::new(
            MockInstaller::new().with_failure("fakemod"),
            HealingConfig::default(),
        );
        let mut executor = MockExecutor::new();
        let input = ExecutionResult {
            exit_code: 1,
            stdout: "partial progress".to_string(),
            stderr: "No module named 'fakemod'".to_string(),
            timed_out: false,
            produced_artifacts: vec!["half.png".into()],
        };

        let outcome = healer.heal(&mut executor, "import fakemod", input).await;

        assert_eq!(outcome.result.exit_code, 1);
        assert!(outcome.result.stdout.is_empty());
        assert!(outcome.result.produced_artifacts.is_empty());
        assert!(outcome.result.stderr.starts_with("CRITICAL ERROR"));
    }

    #[tokio::test]
    async fn test_alias_without_bare_import_is_left_alone() {
        let healer = SelfHealer::new(MockInstaller::new(), HealingConfig::default());
        let mut executor = MockExecutor::new();

        let outcome = healer
            .heal(&mut executor, "from plt import x", failed("No module named 'plt'"))
            .await;

        assert!(outcome.actions.is_empty());
        assert!(executor.executed().is_empty());
        assert!(healer.installer().requested().is_empty());
    }
}
