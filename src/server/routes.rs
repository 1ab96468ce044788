//! REST routes: unread triage, mark-read, question answering, health.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use super::{ApiError, AppState};
use crate::error::MailStoreError;
use crate::qa::{self, QaEmail};

/// Build the router. CORS is wide open: the reference client is a
/// browser extension served from another origin.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/health", get(health))
        .route("/api/unread-emails", get(unread_emails))
        .route("/api/mark-read", post(mark_read))
        .route("/api/ask-question", post(ask_question))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Pull the bearer token out of the Authorization header. The token is
/// forwarded to the mail store, never validated here.
fn bearer_token(headers: &HeaderMap) -> Result<&str, MailStoreError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(MailStoreError::MissingAuth)?;

    match header.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() => {
            Ok(token)
        }
        _ => Err(MailStoreError::MissingAuth),
    }
}

async fn root() -> &'static str {
    "Backend is running."
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let provider = state
        .backend
        .as_ref()
        .map(|backend| format!("Google Gemini ({})", backend.model_name()))
        .unwrap_or_else(|| "rule-based fallback".to_string());

    Json(json!({
        "status": "ok",
        "ai_provider": provider,
        "api_key_configured": state.backend.is_some(),
    }))
}

/// Fetch unread messages, triage them, and return them ranked.
async fn unread_emails(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let token = bearer_token(&headers)?;

    let messages = state.store.fetch_unread(token, state.max_batch).await?;
    info!(count = messages.len(), "Triaging unread batch");

    let ranked = state.ranker.rank(messages).await;
    Ok(Json(json!({ "emails": ranked })))
}

#[derive(Debug, Deserialize)]
struct MarkReadRequest {
    #[serde(default)]
    email_id: String,
}

async fn mark_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<MarkReadRequest>,
) -> Result<Json<Value>, ApiError> {
    let token = bearer_token(&headers)?;

    if request.email_id.is_empty() {
        return Err(ApiError::BadRequest("email_id is required".into()));
    }

    state.store.mark_read(token, &request.email_id).await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
struct AskRequest {
    #[serde(default)]
    question: String,
    #[serde(default)]
    emails: Vec<QaEmail>,
}

async fn ask_question(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<Value>, ApiError> {
    if request.question.trim().is_empty() {
        return Err(ApiError::BadRequest("No question provided".into()));
    }

    let Some(backend) = state.backend.as_ref() else {
        return Err(ApiError::Internal(
            "Gemini API key not configured on server".into(),
        ));
    };

    let answer = qa::answer_question(backend.as_ref(), &request.question, &request.emails)
        .await
        .map_err(|e| {
            warn!(error = %e, "Question answering failed");
            ApiError::Upstream(format!("AI provider request failed: {e}"))
        })?;

    Ok(Json(json!({ "answer": answer })))
}
