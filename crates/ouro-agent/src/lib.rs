//! # ouro-agent
//!
//! Talks to the text-generation provider.
//!
//! - [`GenerationProvider`] is the seam between the loop and the network
//! - [`GeminiProvider`] implements it over the Gemini REST API
//! - [`ModelCascadeClient`] walks an ordered model list, falls back to
//!   discovery and never returns an error

mod auth;
mod cascade;
mod client;
mod provider;
mod response;
mod types;

pub use auth::{get_auth_token, FALLBACK_API_KEY_ENV};
pub use cascade::{ModelCascadeClient, DISCOVERY_EMPTY_SUFFIX};
pub use client::{model_path, GeminiProvider};
pub use provider::{GenerationProvider, MockProvider, ProviderCall};
pub use response::strip_code_fences;
pub use types::*;
