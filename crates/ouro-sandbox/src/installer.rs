//! Package installation for missing dependencies

use async_trait::async_trait;
use ouro_core::{OuroError, Result};
use std::process::Stdio;
use std::sync::Mutex;
use tokio::process::Command;
use tracing::{info, instrument, warn};

/// Trait for installing packages (allows mocking in tests)
#[async_trait]
pub trait PackageInstaller: Send + Sync {
    /// Install `package`. Not retried by callers.
    async fn install(&self, package: &str) -> Result<()>;
}

/// Installs packages with `<interpreter> -m pip install --user`
#[derive(Debug, Clone)]
pub struct PipInstaller {
    interpreter: String,
}

impl PipInstaller {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
        }
    }
}

impl Default for PipInstaller {
    fn default() -> Self {
        Self::new("python3")
    }
}

#[async_trait]
impl PackageInstaller for PipInstaller {
    #[instrument(skip(self), fields(interpreter = %self.interpreter))]
    async fn install(&self, package: &str) -> Result<()> {
        info!("Installing {}", package);

        let output = Command::new(&self.interpreter)
            .args(["-m", "pip", "install", "--user", package])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                OuroError::DependencyUnavailable(format!("Failed to run pip for {}: {}", package, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("pip install {} failed: {}", package, stderr.trim());
            return Err(OuroError::DependencyUnavailable(format!(
                "pip install {} failed: {}",
                package,
                stderr.trim()
            )));
        }

        Ok(())
    }
}

/// Mock installer for testing
///
/// Every package succeeds unless registered with [`MockInstaller::with_failure`].
#[derive(Debug, Default)]
pub struct MockInstaller {
    failing: Vec<String>,
    installed: Mutex<Vec<String>>,
}

impl MockInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure(mut self, package: &str) -> Self {
        self.failing.push(package.to_string());
        self
    }

    /// Packages requested so far, in order (including failed ones)
    pub fn requested(&self) -> Vec<String> {
        self.installed
            .lock()
            .map(|installed| installed.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PackageInstaller for MockInstaller {
    async fn install(&self, package: &str) -> Result<()> {
        if let Ok(mut installed) = self.installed.lock() {
            installed.push(package.to_string());
        }

        if self.failing.iter().any(|p| p == package) {
            return Err(OuroError::DependencyUnavailable(format!(
                "No matching distribution found for {}",
                package
            )));
        }
        Ok(())
    }
}
