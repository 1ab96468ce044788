//! Gemini REST backend (`models/{model}:generateContent`).

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::debug;

use super::{GenerationRequest, GenerativeBackend};
use crate::error::LlmError;

/// Per-attempt request timeout. Retries are the classifier's job; one
/// call never blocks longer than this.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini generateContent client.
pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
}

impl GeminiBackend {
    pub fn new(api_key: SecretString, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model: model.to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{API_BASE}/{}:generateContent", self.model)
    }
}

#[async_trait]
impl GenerativeBackend for GeminiBackend {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String, LlmError> {
        let mut generation_config = json!({
            "temperature": request.temperature,
            "maxOutputTokens": request.max_output_tokens,
        });
        if request.json_output {
            generation_config["responseMimeType"] = json!("application/json");
        }

        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": request.prompt }],
            }],
            "generationConfig": generation_config,
        });

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.expose_secret())])
            .json(&body)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status();

        if status.as_u16() == 429 {
            return Err(LlmError::RateLimited {
                retry_after: parse_retry_after(&response),
            });
        }

        if !status.is_success() {
            let reason = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                reason,
            });
        }

        // A 200 with an undecodable body is malformed content, not a
        // transport fault, so it must not be retried.
        let payload: Value = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("response body: {e}")))?;

        let text = extract_candidate_text(&payload)
            .ok_or_else(|| LlmError::InvalidResponse("no text in first candidate".into()))?;

        debug!(model = %self.model, chars = text.len(), "Gemini response received");
        Ok(text)
    }
}

/// Pull `candidates[0].content.parts[0].text` out of a generateContent
/// response. Empty text counts as absent.
fn extract_candidate_text(payload: &Value) -> Option<String> {
    let text = payload
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()?;
    if text.trim().is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Read a `Retry-After` seconds header if the provider sent one. Used
/// for diagnostics only; the classifier's backoff schedule is fixed.
fn parse_retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
