//! Low-value pre-check that runs before any paid classification.
//!
//! Matches sender and subject against a fixed promotional/automated
//! vocabulary. A hit short-circuits both the backend call and the rule
//! scorer's escalation steps.

use regex::Regex;

/// Case-insensitive alternation over the low-value vocabulary.
///
/// Substring semantics: "deal" also hits "dealer" and "deadline". The
/// filter is a cheap cost gate, not a precise classifier.
const LOW_VALUE_PATTERN: &str = "(?i)noreply|marketing|promo|unsubscribe|coupon|newsletter\
                                 |advertisement|deal|offer|weekly digest|sale|save now";

/// Keyword pre-filter for obviously low-value messages.
#[derive(Debug, Clone)]
pub struct HeuristicFilter {
    pattern: Regex,
}

impl HeuristicFilter {
    pub fn new() -> Self {
        Self {
            // Static pattern, cannot fail to compile.
            pattern: Regex::new(LOW_VALUE_PATTERN).unwrap(),
        }
    }

    /// True when either field contains a low-value token. Pure and total,
    /// no failure mode.
    pub fn is_low_value(&self, sender: &str, subject: &str) -> bool {
        self.pattern.is_match(sender) || self.pattern.is_match(subject)
    }
}

impl Default for HeuristicFilter {
    fn default() -> Self {
        Self::new()
    }
}
