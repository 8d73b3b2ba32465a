//! Model cascade with discovery fallback
//!
//! Generation never fails from the caller's point of view. The cascade runs
//! in two phases:
//! 1. The configured models, in order, with a cooldown after each failure
//! 2. Once the list is exhausted, a single discovery call and the same
//!    try/cooldown pattern over whatever the provider reports
//!
//! If both phases come up empty the result is a sentinel program that prints
//! the last error, so the sandbox still has something to run and the error
//! reaches the user through the normal output path.

use crate::provider::GenerationProvider;
use crate::response::strip_code_fences;
use ouro_core::{
    CascadeConfig, GenerationResult, OuroError, Result, Stage, StatusSink, StatusUpdate,
    TracingStatusSink,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Appended to the last error when discovery yields nothing to try
pub const DISCOVERY_EMPTY_SUFFIX: &str = " | Discovery: no models found.";

/// Ordered model fallback over a [`GenerationProvider`]
pub struct ModelCascadeClient<P: GenerationProvider> {
    provider: P,
    models: Vec<String>,
    cooldown: Duration,
    discovery_cooldown: Duration,
    status: Arc<dyn StatusSink>,
}

impl<P: GenerationProvider> ModelCascadeClient<P> {
    /// Cascade over `models` with the default cooldowns
    pub fn new(provider: P, models: Vec<String>) -> Self {
        let defaults = CascadeConfig::default();
        Self {
            provider,
            models,
            cooldown: defaults.cooldown(),
            discovery_cooldown: defaults.discovery_cooldown(),
            status: Arc::new(TracingStatusSink),
        }
    }

    pub fn from_config(provider: P, config: &CascadeConfig) -> Self {
        Self::new(provider, config.models.clone())
            .with_cooldowns(config.cooldown(), config.discovery_cooldown())
    }

    pub fn with_cooldowns(mut self, cooldown: Duration, discovery_cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self.discovery_cooldown = discovery_cooldown;
        self
    }

    pub fn with_status_sink(mut self, status: Arc<dyn StatusSink>) -> Self {
        self.status = status;
        self
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Produce a program for `prompt`, falling back to the sentinel
    pub async fn generate(&self, prompt: &str) -> GenerationResult {
        let mut last_error: Option<OuroError> = None;

        for (index, model) in self.models.iter().enumerate() {
            if index > 0 {
                self.notify(Stage::Reroute, format!("Rerouting to {}...", model), 25);
            }

            match self.try_model(model, prompt).await {
                Ok(code) => return GenerationResult::from_model(code, model.clone()),
                Err(e) => {
                    warn!("Model {} failed: {}", model, e);
                    last_error = Some(e);
                    tokio::time::sleep(self.cooldown).await;
                }
            }
        }

        self.notify(
            Stage::Discovery,
            "All preset models failed. Discovering available models...",
            30,
        );

        let discovered = match self.provider.list_available_models().await {
            Ok(models) => models,
            Err(e) => {
                warn!("Model discovery failed: {}", e);
                Vec::new()
            }
        };

        if discovered.is_empty() {
            let detail = format!("{}{}", describe(last_error.as_ref()), DISCOVERY_EMPTY_SUFFIX);
            return self.exhausted(detail);
        }

        info!("Discovery returned {} models", discovered.len());
        let total = discovered.len();
        for (index, model) in discovered.into_iter().enumerate() {
            self.notify(
                Stage::Discovery,
                format!("Trying discovered model {} ({}/{})", model, index + 1, total),
                35,
            );

            match self.try_model(&model, prompt).await {
                Ok(code) => return GenerationResult::from_model(code, model),
                Err(e) => {
                    warn!("Discovered model {} failed: {}", model, e);
                    last_error = Some(e);
                    tokio::time::sleep(self.discovery_cooldown).await;
                }
            }
        }

        self.exhausted(describe(last_error.as_ref()))
    }

    async fn try_model(&self, model: &str, prompt: &str) -> Result<String> {
        debug!("Trying model {}", model);
        let raw = self.provider.send_prompt(model, prompt).await?;
        let code = strip_code_fences(&raw);
        if code.is_empty() {
            return Err(OuroError::Provider(format!(
                "{} returned an empty response",
                model
            )));
        }
        Ok(code)
    }

    fn exhausted(&self, detail: String) -> GenerationResult {
        let error = OuroError::GenerationExhausted(format!(
            "All routes exhausted. Last error: {}",
            detail
        ));
        warn!("{}", error);
        GenerationResult::sentinel(&error.to_string())
    }

    fn notify(&self, stage: Stage, message: impl Into<String>, progress: u8) {
        self.status.notify(StatusUpdate::new(stage, message, progress));
    }
}

fn describe(error: Option<&OuroError>) -> String {
    error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no models configured".to_string())
}
