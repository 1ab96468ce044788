//! HTTP surface for the triage service.

mod routes;

pub use routes::api_routes;

use std::sync::Arc;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::MailStoreError;
use crate::llm::GenerativeBackend;
use crate::mailstore::MailStore;
use crate::pipeline::ranker::BatchRanker;

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MailStore>,
    pub ranker: Arc<BatchRanker>,
    /// `None` when no API key is configured; triage still works in
    /// rule-scorer mode, only question answering reports an error.
    pub backend: Option<Arc<dyn GenerativeBackend>>,
    /// Unread messages fetched per request.
    pub max_batch: usize,
}

/// API-level error with its HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    BadRequest(String),

    /// The mail store or the generative provider failed.
    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<MailStoreError> for ApiError {
    fn from(e: MailStoreError) -> Self {
        match e {
            MailStoreError::MissingAuth | MailStoreError::Unauthorized => {
                Self::Unauthorized(e.to_string())
            }
            MailStoreError::Status { .. } | MailStoreError::Transport(_) => {
                Self::Upstream(e.to_string())
            }
            MailStoreError::Decode { .. } => Self::Internal(e.to_string()),
        }
    }
}
