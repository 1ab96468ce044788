//! Shared types for the triage pipeline.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Summary strings are capped at this many characters, ellipsis included.
pub const SUMMARY_MAX_CHARS: usize = 100;

/// An inbound message as handed over by the mail store.
///
/// All fields are plain strings. `date` is a display label and is never
/// parsed. Placeholder defaults ("Unknown", "No Subject") are applied at
/// the store boundary, so the pipeline always sees complete values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub date: String,
}

/// The outcome of any scoring path.
///
/// Invariant: `priority` is in [1, 10] no matter which path produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub summary: String,
    pub priority: u8,
    pub reason: String,
}

/// A triaged message as served to the delivery layer.
///
/// Flat on purpose: this is the API response shape. The body is not
/// echoed back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResult {
    pub id: String,
    pub subject: String,
    pub sender: String,
    pub date: String,
    pub summary: String,
    pub priority: u8,
    pub reason: String,
}

impl RankedResult {
    pub fn new(message: &Message, classification: Classification) -> Self {
        Self {
            id: message.id.clone(),
            subject: message.subject.clone(),
            sender: message.sender.clone(),
            date: message.date.clone(),
            summary: classification.summary,
            priority: classification.priority,
            reason: classification.reason,
        }
    }
}

/// Entry point of the triage escalation ladder.
///
/// `AiClassifier` is the production implementation and cannot fail; the
/// `Result` exists so the batch ranker can absorb unexpected failures
/// from other implementations without aborting a batch.
#[async_trait]
pub trait TriagePolicy: Send + Sync {
    async fn triage(&self, message: &Message) -> Result<Classification, PipelineError>;
}

/// Clamp a raw priority into the valid [1, 10] band.
pub fn clamp_priority(raw: i64) -> u8 {
    raw.clamp(1, 10) as u8
}

/// Build the `"{sender}: {subject}"` summary line, truncated to
/// [`SUMMARY_MAX_CHARS`].
pub fn compose_summary(sender: &str, subject: &str) -> String {
    truncate_summary(&format!("{sender}: {subject}"))
}

/// Cap a summary at [`SUMMARY_MAX_CHARS`] characters, replacing the tail
/// with a three-character ellipsis when it overflows.
pub fn truncate_summary(summary: &str) -> String {
    if summary.chars().count() > SUMMARY_MAX_CHARS {
        let head: String = summary.chars().take(SUMMARY_MAX_CHARS - 3).collect();
        format!("{head}...")
    } else {
        summary.to_string()
    }
}
