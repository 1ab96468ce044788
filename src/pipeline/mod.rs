//! The classification pipeline.
//!
//! Per message, triage is one escalation ladder:
//! 1. `HeuristicFilter` — obvious low-value mail is scored without any
//!    external call
//! 2. `AiClassifier` — backend call under bounded retry/backoff
//! 3. `RuleScorer` — deterministic fallback whenever the backend is
//!    missing, malformed, rate-limited past budget, or failing
//!
//! `BatchRanker` applies the ladder across a batch and orders the
//! results by descending priority.

pub mod classifier;
pub mod heuristics;
pub mod ranker;
pub mod rules;
pub mod types;
