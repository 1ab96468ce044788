//! Deterministic rule scorer, the bottom of the fallback ladder.
//!
//! Pure keyword scoring with no external calls. Order matters: a
//! low-value hit short-circuits every later step, sender tiers are
//! first-match-wins with no stacking, and the urgency/risk boosts are
//! additive on top of whichever tier matched.

use tracing::debug;

use crate::pipeline::heuristics::HeuristicFilter;
use crate::pipeline::types::{Classification, clamp_priority, compose_summary};

/// Priority for messages no rule touches.
const BASELINE_PRIORITY: u8 = 5;

/// Priority for heuristic filter hits.
const LOW_VALUE_PRIORITY: u8 = 2;

/// Only this many leading body characters are inspected for risk tokens.
const BODY_SCAN_CHARS: usize = 200;

// Sender-authority tiers, checked in precedence order.
const GOVERNMENT_TOKENS: &[&str] = &["gov", "government", "irs", "court", "legal", ".gov"];
const MANAGEMENT_TOKENS: &[&str] = &["boss", "manager", "ceo", "director"];
const EDUCATION_TOKENS: &[&str] = &["teacher", "professor", "instructor", ".edu"];

/// Subject tokens that add the urgency boost.
const URGENT_TOKENS: &[&str] = &[
    "urgent",
    "immediate",
    "action required",
    "deadline",
    "asap",
    "emergency",
    "important",
];

/// Body tokens that add the financial/deadline risk boost.
const RISK_TOKENS: &[&str] = &["due date", "overdue", "payment", "suspended", "expires"];

fn contains_any(haystack: &str, tokens: &[&str]) -> bool {
    tokens.iter().any(|token| haystack.contains(token))
}

/// Deterministic scorer used whenever the AI path is skipped or fails.
#[derive(Debug, Clone, Default)]
pub struct RuleScorer {
    filter: HeuristicFilter,
}

impl RuleScorer {
    pub fn new() -> Self {
        Self {
            filter: HeuristicFilter::new(),
        }
    }

    /// Score a message from keyword signals alone. Total: identical
    /// inputs always produce an identical classification.
    pub fn score(&self, subject: &str, sender: &str, body: &str) -> Classification {
        if self.filter.is_low_value(sender, subject) {
            return Classification {
                summary: compose_summary(sender, subject),
                priority: LOW_VALUE_PRIORITY,
                reason: "Automated/promotional filter hit".to_string(),
            };
        }

        let sender_lower = sender.to_lowercase();
        let subject_lower = subject.to_lowercase();

        let mut priority = BASELINE_PRIORITY;
        let mut reason = String::from("Default priority");

        // First tier wins; tiers never stack.
        if contains_any(&sender_lower, GOVERNMENT_TOKENS) {
            priority = 9;
            reason = "Government/legal sender".to_string();
        } else if contains_any(&sender_lower, MANAGEMENT_TOKENS) {
            priority = 8;
            reason = "Management communication".to_string();
        } else if contains_any(&sender_lower, EDUCATION_TOKENS) {
            priority = 7;
            reason = "Educational authority".to_string();
        }

        if contains_any(&subject_lower, URGENT_TOKENS) {
            priority = (priority + 2).min(10);
            reason.push_str(" + urgent keywords");
        }

        let body_head: String = body
            .chars()
            .take(BODY_SCAN_CHARS)
            .collect::<String>()
            .to_lowercase();
        if contains_any(&body_head, RISK_TOKENS) {
            priority = (priority + 1).min(10);
        }

        let priority = clamp_priority(i64::from(priority));
        debug!(priority, %reason, "Rule-based score");

        Classification {
            summary: compose_summary(sender, subject),
            priority,
            reason,
        }
    }
}
