//! Generative backend boundary.
//!
//! The pipeline only needs "prompt in, text out, typed failures", so
//! everything provider-specific sits behind [`GenerativeBackend`] and the
//! classifier's retry/backoff stays testable against fakes.

mod gemini;

pub use gemini::GeminiBackend;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::TriageConfig;
use crate::error::LlmError;

/// One generation round trip.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Ask the provider for a strict-JSON response body.
    pub json_output: bool,
}

/// A call/response text-generation capability.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Model identifier, for logs and the health endpoint.
    fn model_name(&self) -> &str;

    /// Run one generation attempt. Returns the response text; an empty
    /// payload is reported as `LlmError::InvalidResponse`, never as an
    /// empty string.
    async fn generate(&self, request: GenerationRequest) -> Result<String, LlmError>;
}

/// Build the backend from configuration. `None` when no API key is set,
/// which the classifier treats as permanent rule-scorer mode.
pub fn create_backend(config: &TriageConfig) -> Option<Arc<dyn GenerativeBackend>> {
    config.gemini_api_key.clone().map(|api_key| {
        tracing::info!(model = %config.model, "Using Gemini backend");
        Arc::new(GeminiBackend::new(api_key, &config.model)) as Arc<dyn GenerativeBackend>
    })
}
