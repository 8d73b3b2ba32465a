//! Generation provider abstraction

use async_trait::async_trait;
use ouro_core::{OuroError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Trait for text-generation providers (allows mocking in tests)
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Send `prompt` to `model_id` and return the raw response text
    async fn send_prompt(&self, model_id: &str, prompt: &str) -> Result<String>;

    /// Models the provider currently serves, in the provider's order
    async fn list_available_models(&self) -> Result<Vec<String>>;
}

#[async_trait]
impl<P: GenerationProvider + ?Sized> GenerationProvider for Arc<P> {
    async fn send_prompt(&self, model_id: &str, prompt: &str) -> Result<String> {
        (**self).send_prompt(model_id, prompt).await
    }

    async fn list_available_models(&self) -> Result<Vec<String>> {
        (**self).list_available_models().await
    }
}

/// A call recorded by [`MockProvider`]
#[derive(Debug, Clone)]
pub struct ProviderCall {
    pub model_id: String,
    pub prompt: String,
    pub at: Instant,
}

/// Mock provider for testing
///
/// Models without a configured response fail with a provider error.
#[derive(Debug, Default)]
pub struct MockProvider {
    responses: HashMap<String, std::result::Result<String, String>>,
    discovered: Option<std::result::Result<Vec<String>, String>>,
    calls: Mutex<Vec<ProviderCall>>,
    discovery_calls: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `model_id` answer with `text`
    pub fn with_response(mut self, model_id: &str, text: &str) -> Self {
        self.responses
            .insert(model_id.to_string(), Ok(text.to_string()));
        self
    }

    /// Make `model_id` fail with `error`
    pub fn with_failure(mut self, model_id: &str, error: &str) -> Self {
        self.responses
            .insert(model_id.to_string(), Err(error.to_string()));
        self
    }

    /// Models returned by discovery
    pub fn with_discovered(mut self, models: &[&str]) -> Self {
        self.discovered = Some(Ok(models.iter().map(|m| m.to_string()).collect()));
        self
    }

    /// Make discovery itself fail
    pub fn with_discovery_failure(mut self, error: &str) -> Self {
        self.discovered = Some(Err(error.to_string()));
        self
    }

    /// Every `send_prompt` call so far
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Model ids in call order
    pub fn called_models(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.model_id).collect()
    }

    pub fn discovery_calls(&self) -> usize {
        self.discovery_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationProvider for MockProvider {
    async fn send_prompt(&self, model_id: &str, prompt: &str) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(ProviderCall {
                model_id: model_id.to_string(),
                prompt: prompt.to_string(),
                at: Instant::now(),
            });
        }

        match self.responses.get(model_id) {
            Some(Ok(text)) => Ok(text.clone()),
            Some(Err(error)) => Err(OuroError::Provider(error.clone())),
            None => Err(OuroError::Provider(format!(
                "No mock response for model: {}",
                model_id
            ))),
        }
    }

    async fn list_available_models(&self) -> Result<Vec<String>> {
        self.discovery_calls.fetch_add(1, Ordering::SeqCst);

        match &self.discovered {
            Some(Ok(models)) => Ok(models.clone()),
            Some(Err(error)) => Err(OuroError::Provider(error.clone())),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_provider() {
        let provider = MockProvider::new()
            .with_response("model-a", "print('hi')")
            .with_failure("model-b", "403 forbidden")
            .with_discovered(&["model-c"]);

        assert_eq!(
            provider.send_prompt("model-a", "p").await.unwrap(),
            "print('hi')"
        );
        assert!(provider.send_prompt("model-b", "p").await.is_err());
        assert!(provider.send_prompt("unknown", "p").await.is_err());
        assert_eq!(
            provider.list_available_models().await.unwrap(),
            vec!["model-c".to_string()]
        );

        assert_eq!(provider.called_models(), vec!["model-a", "model-b", "unknown"]);
        assert_eq!(provider.discovery_calls(), 1);
    }
}
