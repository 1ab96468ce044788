//! Free-text question answering over the current batch.
//!
//! Stateless prompt passthrough: the ranked emails are inlined as
//! context, the question is appended, and the backend is called once.
//! No triage logic and no retry discipline here.

use serde::Deserialize;

use crate::error::LlmError;
use crate::llm::{GenerationRequest, GenerativeBackend};

const ANSWER_TEMPERATURE: f32 = 0.7;
const ANSWER_MAX_OUTPUT_TOKENS: u32 = 500;

/// Email context as supplied by the client. Lenient on purpose: the
/// client echoes back previously ranked results, but nothing forces it
/// to send every field.
#[derive(Debug, Clone, Deserialize)]
pub struct QaEmail {
    #[serde(default = "unknown_sender")]
    pub sender: String,
    #[serde(default = "no_subject")]
    pub subject: String,
    #[serde(default = "no_summary")]
    pub summary: String,
    #[serde(default)]
    pub priority: Option<i64>,
}

fn unknown_sender() -> String {
    "Unknown".to_string()
}

fn no_subject() -> String {
    "No subject".to_string()
}

fn no_summary() -> String {
    "No summary".to_string()
}

/// Answer a question about the supplied emails with one backend call.
pub async fn answer_question(
    backend: &dyn GenerativeBackend,
    question: &str,
    emails: &[QaEmail],
) -> Result<String, LlmError> {
    let request = GenerationRequest {
        prompt: build_question_prompt(question, emails),
        temperature: ANSWER_TEMPERATURE,
        max_output_tokens: ANSWER_MAX_OUTPUT_TOKENS,
        json_output: false,
    };
    backend.generate(request).await
}

fn build_question_prompt(question: &str, emails: &[QaEmail]) -> String {
    let mut context = String::from("Here are the user's current unread emails:\n\n");
    for (i, email) in emails.iter().enumerate() {
        context.push_str(&format!("Email {}:\n", i + 1));
        context.push_str(&format!("From: {}\n", email.sender));
        context.push_str(&format!("Subject: {}\n", email.subject));
        context.push_str(&format!("Summary: {}\n", email.summary));
        match email.priority {
            Some(priority) => context.push_str(&format!("Priority: {priority}/10\n\n")),
            None => context.push_str("Priority: N/A/10\n\n"),
        }
    }

    format!(
        "{context}\nUser's question: {question}\n\n\
         Please answer the user's question about their emails. Be helpful, concise, and \
         specific. Reference specific emails by their sender or subject when relevant."
    )
}
