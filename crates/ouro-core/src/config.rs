//! Configuration management for Ouro
//!
//! Settings live in `.ouro/config.toml` under the working directory. Every
//! field has a default, so a missing file or a partial file is fine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{OuroError, Result};

/// Directory holding config and the activity log
pub const OURO_DIR: &str = ".ouro";

/// Top-level Ouro configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OuroConfig {
    /// Model cascade and provider settings
    #[serde(default)]
    pub cascade: CascadeConfig,

    /// Sandboxed execution settings
    #[serde(default)]
    pub sandbox: SandboxConfig,

    /// Self-healing rules
    #[serde(default)]
    pub healing: HealingConfig,

    /// Outer retry loop
    #[serde(default)]
    pub reflexion: ReflexionConfig,
}

/// Model cascade configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeConfig {
    /// Models tried in order before discovery
    #[serde(default = "default_models")]
    pub models: Vec<String>,

    /// Pause after a failed cascade call
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Pause after a failed discovery call
    #[serde(default = "default_discovery_cooldown_ms")]
    pub discovery_cooldown_ms: u64,

    /// Environment variable containing the provider API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

/// Sandbox configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Interpreter used to run generated programs
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// File name of the persisted program, relative to the working directory
    #[serde(default = "default_script_name")]
    pub script_name: String,

    /// Wall-clock limit for one execution
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Extensions (without dot) that count as produced artifacts
    #[serde(default = "default_artifact_extensions")]
    pub artifact_extensions: Vec<String>,
}

/// Self-healing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealingConfig {
    /// Remediation cycles allowed per execution
    #[serde(default = "default_heal_attempts")]
    pub max_attempts: usize,

    /// Import name -> installable package name
    #[serde(default = "default_package_aliases")]
    pub package_aliases: BTreeMap<String, String>,

    /// Bare alias import -> correct import line (fixed in code, never installed)
    #[serde(default = "default_import_aliases")]
    pub import_aliases: BTreeMap<String, String>,
}

/// Reflexion loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflexionConfig {
    /// Retries after the first attempt
    #[serde(default = "default_max_reflexion")]
    pub max_reflexion: usize,

    /// Write `.ouro/activity.md`
    #[serde(default = "default_activity_log")]
    pub activity_log: bool,
}

// Default value providers
fn default_models() -> Vec<String> {
    vec![
        "gemini-1.5-flash".to_string(),
        "gemini-1.5-pro".to_string(),
        "gemini-1.0-pro".to_string(),
        "gemini-pro".to_string(),
    ]
}

fn default_cooldown_ms() -> u64 {
    500
}

fn default_discovery_cooldown_ms() -> u64 {
    1000
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_script_name() -> String {
    "ouro_exec.py".to_string()
}

fn default_timeout_secs() -> u64 {
    45
}

fn default_artifact_extensions() -> Vec<String> {
    ["png", "jpg", "jpeg", "svg"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_heal_attempts() -> usize {
    3
}

fn default_package_aliases() -> BTreeMap<String, String> {
    [
        ("sklearn", "scikit-learn"),
        ("cv2", "opencv-python-headless"),
        ("PIL", "Pillow"),
        ("skimage", "scikit-image"),
        ("yaml", "PyYAML"),
        ("bs4", "beautifulsoup4"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_import_aliases() -> BTreeMap<String, String> {
    [("plt", "import matplotlib.pyplot as plt")]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn default_max_reflexion() -> usize {
    5
}

fn default_activity_log() -> bool {
    true
}

impl OuroConfig {
    /// Path of the config file for a working directory
    pub fn path_for(work_dir: &Path) -> PathBuf {
        work_dir.join(OURO_DIR).join("config.toml")
    }

    /// Load configuration from `.ouro/config.toml` or use defaults
    pub fn load_or_default(work_dir: &Path) -> Result<Self> {
        let config_path = Self::path_for(work_dir);

        let config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)
                .map_err(|e| OuroError::Config(format!("Failed to parse config file: {}", e)))?
        } else {
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Write default configuration to `.ouro/config.toml`
    pub fn write_default(work_dir: &Path) -> Result<PathBuf> {
        let config_dir = work_dir.join(OURO_DIR);
        std::fs::create_dir_all(&config_dir)?;

        let config_path = Self::path_for(work_dir);
        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| OuroError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(&config_path, content)?;
        Ok(config_path)
    }

    /// Reject settings the loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.sandbox.timeout_secs == 0 {
            return Err(OuroError::Config(
                "sandbox.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.sandbox.interpreter.trim().is_empty() {
            return Err(OuroError::Config(
                "sandbox.interpreter must not be empty".to_string(),
            ));
        }
        let script = Path::new(&self.sandbox.script_name);
        if script.is_absolute() || script.components().count() != 1 {
            return Err(OuroError::Config(format!(
                "sandbox.script_name must be a plain file name: {}",
                self.sandbox.script_name
            )));
        }
        Ok(())
    }
}

impl CascadeConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn discovery_cooldown(&self) -> Duration {
        Duration::from_millis(self.discovery_cooldown_ms)
    }
}

impl SandboxConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            models: default_models(),
            cooldown_ms: default_cooldown_ms(),
            discovery_cooldown_ms: default_discovery_cooldown_ms(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            script_name: default_script_name(),
            timeout_secs: default_timeout_secs(),
            artifact_extensions: default_artifact_extensions(),
        }
    }
}

impl Default for HealingConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_heal_attempts(),
            package_aliases: default_package_aliases(),
            import_aliases: default_import_aliases(),
        }
    }
}

impl Default for ReflexionConfig {
    fn default() -> Self {
        Self {
            max_reflexion: default_max_reflexion(),
            activity_log: default_activity_log(),
        }
    }
}
