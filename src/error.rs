//! Error types for the triage service.

use std::time::Duration;

/// Mail store errors. These are the only failures an API caller ever
/// sees, since they happen before triage begins.
#[derive(Debug, thiserror::Error)]
pub enum MailStoreError {
    #[error("Authorization header is missing or malformed")]
    MissingAuth,

    #[error("Mail store rejected the access token")]
    Unauthorized,

    #[error("Mail store request failed with status {status}: {reason}")]
    Status { status: u16, reason: String },

    #[error("Mail store transport error: {0}")]
    Transport(String),

    #[error("Failed to decode message {id}: {reason}")]
    Decode { id: String, reason: String },
}

/// Generative backend errors, split by retry semantics.
///
/// The classifier adapter keys its escalation ladder off these variants:
/// `RateLimited` and `Transport` are retried with backoff, everything
/// else falls straight through to the rule scorer.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Transient: the provider asked us to slow down.
    #[error("Backend rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// Transient: connection or timeout failure.
    #[error("Backend transport error: {0}")]
    Transport(String),

    /// Non-transient: an unexpected status code.
    #[error("Backend request failed with status {status}: {reason}")]
    Status { status: u16, reason: String },

    /// Non-retryable: a success response with an empty or unusable payload.
    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),
}

/// Unexpected per-message triage failure.
///
/// Never produced by the production classifier (its fallback ladder is
/// total); the batch ranker absorbs it so one bad message cannot abort
/// a batch.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Triage failed: {0}")]
    Triage(String),
}
