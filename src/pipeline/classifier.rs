//! AI classifier adapter. This type owns the escalation ladder and is
//! the triage policy entry point.
//!
//! Flow per message:
//! 1. Heuristic filter: low-value mail never reaches the backend.
//! 2. Generative backend under bounded retry/backoff.
//! 3. Rule scorer whenever the backend is unconfigured, malformed,
//!    rate-limited past the attempt budget, or failing.
//!
//! Every exit path returns a valid `Classification`; a backend failure
//! is never surfaced to the caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::error::{LlmError, PipelineError};
use crate::llm::{GenerationRequest, GenerativeBackend};
use crate::pipeline::heuristics::HeuristicFilter;
use crate::pipeline::rules::RuleScorer;
use crate::pipeline::types::{
    Classification, Message, TriagePolicy, clamp_priority, truncate_summary,
};

/// Attempt budget for the backend call.
const MAX_ATTEMPTS: u32 = 3;

/// Body characters included in the prompt.
const PROMPT_BODY_CHARS: usize = 1000;

/// Generation parameters for the triage call.
const TRIAGE_TEMPERATURE: f32 = 0.4;
const TRIAGE_MAX_OUTPUT_TOKENS: u32 = 1024;

const TRIAGE_INSTRUCTION: &str = "You are an email prioritization expert. Your primary goal is \
    to identify emails that require a *personal, timely response* or contain *critical personal \
    or professional information*. Be extremely critical of any email that resembles marketing, \
    automated reports, or social media notifications. Only assign a priority score of 7 or \
    higher if the email demands immediate human action or contains legally/financially \
    important content.";

/// Classifier with a deterministic fallback ladder.
pub struct AiClassifier {
    backend: Option<Arc<dyn GenerativeBackend>>,
    filter: HeuristicFilter,
    scorer: RuleScorer,
}

impl AiClassifier {
    /// `backend: None` is the degraded mode: every message is scored by
    /// the rule scorer.
    pub fn new(backend: Option<Arc<dyn GenerativeBackend>>) -> Self {
        Self {
            backend,
            filter: HeuristicFilter::new(),
            scorer: RuleScorer::new(),
        }
    }

    /// Classify one message. Infallible: walks down the ladder until the
    /// rule scorer, which is total.
    pub async fn classify(&self, message: &Message) -> Classification {
        // Obvious low-value mail skips the paid path entirely. This also
        // keeps the backend from over-scoring flashy promotional subjects.
        if self.filter.is_low_value(&message.sender, &message.subject) {
            debug!(
                id = %message.id,
                subject = %message.subject,
                "Low-value heuristic hit, skipping backend"
            );
            return self.fallback(message);
        }

        let Some(backend) = self.backend.as_ref() else {
            debug!(id = %message.id, "No backend configured, using rule scorer");
            return self.fallback(message);
        };

        let request = GenerationRequest {
            prompt: build_triage_prompt(message),
            temperature: TRIAGE_TEMPERATURE,
            max_output_tokens: TRIAGE_MAX_OUTPUT_TOKENS,
            json_output: true,
        };

        for attempt in 0..MAX_ATTEMPTS {
            match backend.generate(request.clone()).await {
                Ok(text) => {
                    return match parse_verdict(&text) {
                        Ok(classification) => classification,
                        Err(reason) => {
                            // Malformed content is not transient; no retry.
                            warn!(
                                id = %message.id,
                                %reason,
                                "Unparseable backend verdict, using rule scorer"
                            );
                            self.fallback(message)
                        }
                    };
                }
                Err(LlmError::RateLimited { retry_after }) => {
                    warn!(
                        id = %message.id,
                        attempt = attempt + 1,
                        max_attempts = MAX_ATTEMPTS,
                        ?retry_after,
                        "Backend rate limited"
                    );
                    if attempt + 1 < MAX_ATTEMPTS {
                        tokio::time::sleep(backoff_delay(attempt)).await;
                    }
                }
                Err(LlmError::Transport(reason)) => {
                    warn!(
                        id = %message.id,
                        attempt = attempt + 1,
                        %reason,
                        "Backend transport failure"
                    );
                    if attempt + 1 < MAX_ATTEMPTS {
                        tokio::time::sleep(backoff_delay(attempt)).await;
                    }
                }
                Err(e @ (LlmError::Status { .. } | LlmError::InvalidResponse(_))) => {
                    // Not expected to resolve on retry.
                    error!(id = %message.id, error = %e, "Backend failure, using rule scorer");
                    return self.fallback(message);
                }
            }
        }

        warn!(id = %message.id, "Backend attempts exhausted, using rule scorer");
        self.fallback(message)
    }

    fn fallback(&self, message: &Message) -> Classification {
        self.scorer
            .score(&message.subject, &message.sender, &message.body)
    }
}

#[async_trait]
impl TriagePolicy for AiClassifier {
    async fn triage(&self, message: &Message) -> Result<Classification, PipelineError> {
        Ok(self.classify(message).await)
    }
}

/// Exponential backoff: 1s, 2s, 4s for attempts 0, 1, 2.
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt)
}

// ── Prompt construction ─────────────────────────────────────────────

fn build_triage_prompt(message: &Message) -> String {
    let body_head: String = message.body.chars().take(PROMPT_BODY_CHARS).collect();
    format!(
        "{TRIAGE_INSTRUCTION}\n\n\
         --- END OF INSTRUCTIONS ---\n\n\
         Analyze this email and provide a brief summary, priority score, and reason.\n\n\
         Email Details:\n\
         From: {sender}\n\
         Date: {date}\n\
         Subject: {subject}\n\
         Body: {body_head}\n\n\
         Respond ONLY with valid JSON in this exact format:\n\
         {{\n\
             \"summary\": \"brief 1-2 sentence summary\",\n\
             \"priority\": 8,\n\
             \"reason\": \"explanation for priority score\"\n\
         }}",
        sender = message.sender,
        date = message.date,
        subject = message.subject,
    )
}

// ── Verdict parsing ─────────────────────────────────────────────────

/// Raw verdict shape. `priority` stays a JSON value so non-integer
/// scores can be coerced instead of rejected.
#[derive(Debug, Deserialize)]
struct Verdict {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    priority: serde_json::Value,
    #[serde(default)]
    reason: String,
}

fn parse_verdict(raw: &str) -> Result<Classification, String> {
    let text = raw.trim();
    if text.is_empty() {
        return Err("empty response text".into());
    }

    let json_str = extract_json_object(text);
    let verdict: Verdict =
        serde_json::from_str(&json_str).map_err(|e| format!("JSON parse error: {e}"))?;

    Ok(Classification {
        summary: truncate_summary(&verdict.summary),
        priority: coerce_priority(&verdict.priority),
        reason: verdict.reason,
    })
}

/// Coerce whatever the model put in `priority` into [1, 10]. Missing or
/// unusable values default to the baseline 5 before clamping.
fn coerce_priority(value: &serde_json::Value) -> u8 {
    let raw = match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(5),
        serde_json::Value::String(s) => s.trim().parse::<i64>().unwrap_or(5),
        _ => 5,
    };
    clamp_priority(raw)
}

/// Extract a JSON object from model output. The backend is asked for a
/// JSON mime type, but models still occasionally wrap the object in
/// markdown fences or prose.
fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    // ── Parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_clean_verdict() {
        let raw = r#"{"summary": "Boss needs the report", "priority": 8, "reason": "direct request"}"#;
        let c = parse_verdict(raw).unwrap();
        assert_eq!(c.summary, "Boss needs the report");
        assert_eq!(c.priority, 8);
        assert_eq!(c.reason, "direct request");
    }

    #[test]
    fn parse_verdict_in_markdown_fence() {
        let raw = "Here you go:\n```json\n{\"summary\": \"x\", \"priority\": 3, \"reason\": \"y\"}\n```";
        let c = parse_verdict(raw).unwrap();
        assert_eq!(c.priority, 3);
    }

    #[test]
    fn parse_verdict_embedded_in_prose() {
        let raw = "My verdict: {\"summary\": \"x\", \"priority\": 6, \"reason\": \"y\"} done.";
        let c = parse_verdict(raw).unwrap();
        assert_eq!(c.priority, 6);
    }

    #[test]
    fn parse_rejects_non_json() {
        assert!(parse_verdict("I cannot classify this email.").is_err());
        assert!(parse_verdict("").is_err());
        assert!(parse_verdict("   \n  ").is_err());
    }

    #[test]
    fn priority_out_of_range_is_clamped() {
        let c = parse_verdict(r#"{"summary": "x", "priority": 99, "reason": "y"}"#).unwrap();
        assert_eq!(c.priority, 10);
        let c = parse_verdict(r#"{"summary": "x", "priority": 0, "reason": "y"}"#).unwrap();
        assert_eq!(c.priority, 1);
        let c = parse_verdict(r#"{"summary": "x", "priority": -2, "reason": "y"}"#).unwrap();
        assert_eq!(c.priority, 1);
    }

    #[test]
    fn non_integer_priority_is_coerced() {
        let c = parse_verdict(r#"{"summary": "x", "priority": 7.9, "reason": "y"}"#).unwrap();
        assert_eq!(c.priority, 7);
        let c = parse_verdict(r#"{"summary": "x", "priority": "12", "reason": "y"}"#).unwrap();
        assert_eq!(c.priority, 10);
        let c = parse_verdict(r#"{"summary": "x", "priority": "high", "reason": "y"}"#).unwrap();
        assert_eq!(c.priority, 5);
    }

    #[test]
    fn missing_priority_defaults_to_baseline() {
        let c = parse_verdict(r#"{"summary": "x", "reason": "y"}"#).unwrap();
        assert_eq!(c.priority, 5);
    }

    #[test]
    fn oversized_summary_is_truncated() {
        let summary = "s".repeat(150);
        let raw = format!(r#"{{"summary": "{summary}", "priority": 5, "reason": "y"}}"#);
        let c = parse_verdict(&raw).unwrap();
        assert_eq!(c.summary.chars().count(), 100);
        assert!(c.summary.ends_with("..."));
    }

    #[test]
    fn prompt_includes_fields_and_truncates_body() {
        let message = Message {
            id: "m-1".into(),
            sender: "alice@example.com".into(),
            subject: "Contract renewal".into(),
            body: "z".repeat(5000),
            date: "Tue, 6 Jan 2026".into(),
        };
        let prompt = build_triage_prompt(&message);
        assert!(prompt.contains("alice@example.com"));
        assert!(prompt.contains("Contract renewal"));
        assert!(prompt.contains("Tue, 6 Jan 2026"));
        // 1000 body chars plus the fixed scaffolding, nowhere near 5000.
        assert!(prompt.len() < 3000);
    }

    // ── Adapter behavior against a scripted backend ─────────────────

    /// Backend fake that plays back a fixed script of results and counts
    /// calls. No network involved.
    struct ScriptedBackend {
        calls: AtomicU32,
        script: Mutex<VecDeque<Result<String, LlmError>>>,
        last_request: Mutex<Option<GenerationRequest>>,
    }

    impl ScriptedBackend {
        fn new(script: Vec<Result<String, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                script: Mutex::new(script.into()),
                last_request: Mutex::new(None),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerativeBackend for ScriptedBackend {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, request: GenerationRequest) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::Transport("script exhausted".into())))
        }
    }

    fn message(sender: &str, subject: &str, body: &str) -> Message {
        Message {
            id: "test-1".into(),
            sender: sender.into(),
            subject: subject.into(),
            body: body.into(),
            date: "Mon, 5 Jan 2026".into(),
        }
    }

    fn good_verdict() -> Result<String, LlmError> {
        Ok(r#"{"summary": "Needs a reply", "priority": 8, "reason": "direct question"}"#.into())
    }

    fn rate_limited() -> Result<String, LlmError> {
        Err(LlmError::RateLimited { retry_after: None })
    }

    #[tokio::test]
    async fn low_value_message_never_calls_backend() {
        let backend = ScriptedBackend::new(vec![good_verdict()]);
        let classifier = AiClassifier::new(Some(backend.clone()));

        let c = classifier
            .classify(&message("newsletter@deals.com", "50% off sale", "buy now"))
            .await;

        assert_eq!(c.priority, 2);
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn unconfigured_backend_uses_rule_scorer() {
        let classifier = AiClassifier::new(None);
        let c = classifier
            .classify(&message("boss@company.com", "Q3 plan", ""))
            .await;
        assert_eq!(c.priority, 8);
        assert_eq!(c.reason, "Management communication");
    }

    #[tokio::test]
    async fn successful_verdict_is_returned() {
        let backend = ScriptedBackend::new(vec![good_verdict()]);
        let classifier = AiClassifier::new(Some(backend.clone()));

        let c = classifier
            .classify(&message("alice@example.com", "Question", "Can you help?"))
            .await;

        assert_eq!(c.priority, 8);
        assert_eq!(c.summary, "Needs a reply");
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn prompt_carries_truncated_body() {
        let backend = ScriptedBackend::new(vec![good_verdict()]);
        let classifier = AiClassifier::new(Some(backend.clone()));

        let long_body = "b".repeat(4000);
        classifier
            .classify(&message("alice@example.com", "Hello", &long_body))
            .await;

        let request = backend.last_request.lock().unwrap().clone().unwrap();
        assert!(request.json_output);
        assert!(request.prompt.contains(&"b".repeat(1000)));
        assert!(!request.prompt.contains(&"b".repeat(1001)));
    }

    #[tokio::test]
    async fn malformed_verdict_falls_back_without_retry() {
        let backend = ScriptedBackend::new(vec![Ok("not json at all".into()), good_verdict()]);
        let classifier = AiClassifier::new(Some(backend.clone()));

        let c = classifier
            .classify(&message("alice@example.com", "Hello", "hi"))
            .await;

        // Rule scorer result, and exactly one attempt was made.
        assert_eq!(c.priority, 5);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn unexpected_status_falls_back_without_retry() {
        let backend = ScriptedBackend::new(vec![Err(LlmError::Status {
            status: 500,
            reason: "internal".into(),
        })]);
        let classifier = AiClassifier::new(Some(backend.clone()));

        let c = classifier
            .classify(&message("court@state.gov", "hearing notice", ""))
            .await;

        assert_eq!(c.priority, 9);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn empty_payload_falls_back_without_retry() {
        let backend = ScriptedBackend::new(vec![Err(LlmError::InvalidResponse(
            "no text in first candidate".into(),
        ))]);
        let classifier = AiClassifier::new(Some(backend.clone()));

        let c = classifier
            .classify(&message("alice@example.com", "Hello", ""))
            .await;

        assert_eq!(c.priority, 5);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_backs_off_then_succeeds() {
        let backend =
            ScriptedBackend::new(vec![rate_limited(), rate_limited(), good_verdict()]);
        let classifier = AiClassifier::new(Some(backend.clone()));

        let started = tokio::time::Instant::now();
        let c = classifier
            .classify(&message("alice@example.com", "Question", "help?"))
            .await;
        let slept = started.elapsed();

        assert_eq!(c.priority, 8);
        assert_eq!(backend.calls(), 3);
        // 1s after attempt one, 2s after attempt two.
        assert!(slept >= Duration::from_secs(3), "slept {slept:?}");
        assert!(slept < Duration::from_secs(4), "slept {slept:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_exhaustion_falls_back() {
        let backend =
            ScriptedBackend::new(vec![rate_limited(), rate_limited(), rate_limited()]);
        let classifier = AiClassifier::new(Some(backend.clone()));

        let c = classifier
            .classify(&message("boss@company.com", "Plan", ""))
            .await;

        assert_eq!(backend.calls(), 3);
        assert_eq!(c.priority, 8);
        assert_eq!(c.reason, "Management communication");
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failures_retry_then_fall_back() {
        let backend = ScriptedBackend::new(vec![
            Err(LlmError::Transport("timeout".into())),
            Err(LlmError::Transport("connection reset".into())),
            Err(LlmError::Transport("timeout".into())),
        ]);
        let classifier = AiClassifier::new(Some(backend.clone()));

        let c = classifier
            .classify(&message("alice@example.com", "Hello", ""))
            .await;

        assert_eq!(backend.calls(), 3);
        assert_eq!(c.priority, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failure_recovers_mid_budget() {
        let backend = ScriptedBackend::new(vec![
            Err(LlmError::Transport("timeout".into())),
            good_verdict(),
        ]);
        let classifier = AiClassifier::new(Some(backend.clone()));

        let c = classifier
            .classify(&message("alice@example.com", "Hello", ""))
            .await;

        assert_eq!(backend.calls(), 2);
        assert_eq!(c.priority, 8);
    }

    #[tokio::test]
    async fn every_adapter_path_stays_in_band() {
        let scripts: Vec<Vec<Result<String, LlmError>>> = vec![
            vec![good_verdict()],
            vec![Ok(r#"{"priority": 42}"#.into())],
            vec![Ok("garbage".into())],
            vec![Err(LlmError::Status { status: 503, reason: String::new() })],
        ];
        for script in scripts {
            let backend = ScriptedBackend::new(script);
            let classifier = AiClassifier::new(Some(backend));
            let c = classifier
                .classify(&message("alice@example.com", "Hello", ""))
                .await;
            assert!((1..=10).contains(&c.priority));
        }
    }
}
