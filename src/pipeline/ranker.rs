//! Batch ranker. Fans triage out over a batch and orders the results.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{error, info};

use crate::pipeline::types::{Message, RankedResult, TriagePolicy};

/// Concurrent in-flight triages per batch. Per-message triage shares no
/// mutable state, so the batch can fan out; the buffered stream restores
/// input order before the sort.
const TRIAGE_CONCURRENCY: usize = 4;

/// Applies the triage policy across a batch and ranks the results.
pub struct BatchRanker {
    policy: Arc<dyn TriagePolicy>,
}

impl BatchRanker {
    pub fn new(policy: Arc<dyn TriagePolicy>) -> Self {
        Self { policy }
    }

    /// Triage every message and return them ranked highest priority first.
    ///
    /// A policy failure on one message drops that message from the result
    /// set and never aborts the batch. Equal priorities keep their input
    /// order: the sort is stable and has no secondary key.
    pub async fn rank(&self, messages: Vec<Message>) -> Vec<RankedResult> {
        let total = messages.len();

        let mut results: Vec<RankedResult> = stream::iter(messages)
            .map(|message| {
                let policy = Arc::clone(&self.policy);
                async move {
                    match policy.triage(&message).await {
                        Ok(classification) => Some(RankedResult::new(&message, classification)),
                        Err(e) => {
                            error!(
                                id = %message.id,
                                error = %e,
                                "Triage failed, dropping message from batch"
                            );
                            None
                        }
                    }
                }
            })
            .buffered(TRIAGE_CONCURRENCY)
            .filter_map(|result| async move { result })
            .collect()
            .await;

        results.sort_by(|a, b| b.priority.cmp(&a.priority));

        info!(ranked = results.len(), total, "Batch ranked");
        results
    }
}
