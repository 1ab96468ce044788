//! Process configuration, read once at startup.

use secrecy::SecretString;
use tracing::warn;

/// Model used when `TRIAGE_MODEL` is unset.
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

const DEFAULT_PORT: u16 = 5000;

/// Unread messages fetched and triaged per request. Bounds classifier
/// cost per request.
const DEFAULT_MAX_BATCH: usize = 10;

/// Service configuration.
///
/// Read from the environment once and injected into constructors, never
/// consulted as ambient global state. Tests exercise both configured and
/// unconfigured modes by building this struct directly.
#[derive(Debug, Clone)]
pub struct TriageConfig {
    /// Gemini API key. `None` is a valid degraded mode: every message is
    /// scored by the deterministic rule scorer.
    pub gemini_api_key: Option<SecretString>,
    /// Model id for the generateContent endpoint.
    pub model: String,
    /// HTTP listen port.
    pub port: u16,
    /// Maximum unread messages fetched per request.
    pub max_batch: usize,
}

impl TriageConfig {
    /// Load configuration from the environment. Invalid values fall back
    /// to defaults with a warning rather than aborting startup.
    pub fn from_env() -> Self {
        let gemini_api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .map(SecretString::from);

        let model =
            std::env::var("TRIAGE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let port = parse_or_default("TRIAGE_PORT", DEFAULT_PORT);
        let max_batch = parse_or_default("TRIAGE_MAX_BATCH", DEFAULT_MAX_BATCH);

        Self {
            gemini_api_key,
            model,
            port,
            max_batch,
        }
    }
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            model: DEFAULT_MODEL.to_string(),
            port: DEFAULT_PORT,
            max_batch: DEFAULT_MAX_BATCH,
        }
    }
}

fn parse_or_default<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "Unparseable value, using default");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_degraded_mode() {
        let config = TriageConfig::default();
        assert!(config.gemini_api_key.is_none());
        assert_eq!(config.model, "gemini-2.5-flash");
        assert_eq!(config.port, 5000);
        assert_eq!(config.max_batch, 10);
    }
}
