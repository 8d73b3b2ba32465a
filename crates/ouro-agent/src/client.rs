//! Gemini API client
//!
//! Implements [`GenerationProvider`] over the `generativelanguage` REST API.
//! Each call is a single stateless request; retries and fallbacks are the
//! cascade's job, not the client's.

use crate::provider::GenerationProvider;
use crate::types::{
    ApiErrorResponse, GenerateContentRequest, GenerateContentResponse, ListModelsResponse,
};
use async_trait::async_trait;
use ouro_core::{OuroError, Result};
use std::time::Duration;
use tracing::{debug, info, instrument};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const API_KEY_HEADER: &str = "x-goog-api-key";
const REQUEST_TIMEOUT_SECS: u64 = 120;
const LIST_PAGE_SIZE: u32 = 1000;

/// Gemini provider client
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl GeminiProvider {
    /// Create a client for the public endpoint
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| OuroError::Provider(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key: api_key.into(),
            base_url: GEMINI_API_URL.to_string(),
            http,
        })
    }

    /// Point the client at a different endpoint (proxies, gateways)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn generate_url(&self, model_id: &str) -> String {
        format!("{}/{}:generateContent", self.base_url, model_path(model_id))
    }
}

/// Resource path for a model id (`gemini-pro` -> `models/gemini-pro`)
pub fn model_path(model_id: &str) -> String {
    if model_id.starts_with("models/") || model_id.starts_with("tunedModels/") {
        model_id.to_string()
    } else {
        format!("models/{}", model_id)
    }
}

/// Turn a non-2xx response into a provider error
async fn error_from_response(context: &str, response: reqwest::Response) -> OuroError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown".to_string());

    let detail = serde_json::from_str::<ApiErrorResponse>(&body)
        .map(|parsed| format!("{} ({})", parsed.error.message, parsed.error.status))
        .unwrap_or(body);

    match status.as_u16() {
        401 | 403 => OuroError::Auth(format!("{} rejected credentials {}: {}", context, status, detail)),
        _ => OuroError::Provider(format!("{} failed {}: {}", context, status, detail)),
    }
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    #[instrument(skip(self, prompt), fields(prompt_chars = prompt.len()))]
    async fn send_prompt(&self, model_id: &str, prompt: &str) -> Result<String> {
        debug!("Sending request to {}", model_id);

        let response = self
            .http
            .post(self.generate_url(model_id))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&GenerateContentRequest::from_prompt(prompt))
            .send()
            .await
            .map_err(|e| OuroError::Provider(format!("Failed to send request: {}", e)))?;

        if !response.status().is_success() {
            return Err(error_from_response(model_id, response).await);
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| OuroError::Provider(format!("Failed to parse response: {}", e)))?;

        let text = body
            .text()
            .ok_or_else(|| OuroError::Provider(format!("{} returned no candidates", model_id)))?;

        match &body.usage_metadata {
            Some(usage) => info!(
                "{} responded ({} chars, {} input tokens, {} output tokens)",
                model_id,
                text.len(),
                usage.prompt_token_count,
                usage.candidates_token_count
            ),
            None => info!("{} responded ({} chars)", model_id, text.len()),
        }

        Ok(text)
    }

    #[instrument(skip(self))]
    async fn list_available_models(&self) -> Result<Vec<String>> {
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(format!("{}/models", self.base_url))
                .header(API_KEY_HEADER, &self.api_key)
                .query(&[("pageSize", LIST_PAGE_SIZE.to_string())]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| OuroError::Provider(format!("Failed to list models: {}", e)))?;

            if !response.status().is_success() {
                return Err(error_from_response("models.list", response).await);
            }

            let page: ListModelsResponse = response
                .json()
                .await
                .map_err(|e| OuroError::Provider(format!("Failed to parse model list: {}", e)))?;

            models.extend(
                page.models
                    .into_iter()
                    .filter(|m| m.supports_generation())
                    .map(|m| m.name),
            );

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("Discovered {} generation models", models.len());
        Ok(models)
    }
}
