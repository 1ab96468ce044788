//! Gmail REST adapter.
//!
//! Lists unread ids, fetches each message in full format, extracts the
//! display headers and the text/plain body, and can clear the UNREAD
//! label. Bodies arrive base64url-encoded per the Gmail API.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use serde_json::Value;
use tracing::{debug, warn};

use super::MailStore;
use crate::error::MailStoreError;
use crate::pipeline::types::Message;

const API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Gmail REST client. Holds no credentials; every call takes the
/// caller's bearer token.
pub struct GmailStore {
    client: reqwest::Client,
}

impl GmailStore {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn get_json(&self, url: &str, token: &str) -> Result<Value, MailStoreError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| MailStoreError::Transport(e.to_string()))?;
        check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| MailStoreError::Transport(e.to_string()))
    }
}

impl Default for GmailStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MailStore for GmailStore {
    async fn fetch_unread(
        &self,
        access_token: &str,
        max: usize,
    ) -> Result<Vec<Message>, MailStoreError> {
        let url = format!("{API_BASE}/messages?q=is:unread&maxResults={max}");
        let listing = self.get_json(&url, access_token).await?;

        let ids: Vec<String> = listing
            .get("messages")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| entry.get("id").and_then(Value::as_str))
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        debug!(unread = ids.len(), "Unread listing fetched");

        let mut messages = Vec::with_capacity(ids.len());
        for id in ids {
            let url = format!("{API_BASE}/messages/{id}?format=full");
            let loaded = self
                .get_json(&url, access_token)
                .await
                .and_then(|payload| parse_message(&id, &payload));
            match loaded {
                Ok(message) => messages.push(message),
                Err(e) => {
                    // One unreadable message must not abort the fetch.
                    warn!(%id, error = %e, "Skipping message that failed to load");
                }
            }
        }
        Ok(messages)
    }

    async fn mark_read(
        &self,
        access_token: &str,
        message_id: &str,
    ) -> Result<(), MailStoreError> {
        let url = format!("{API_BASE}/messages/{message_id}/modify");
        let response = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .json(&serde_json::json!({ "removeLabelIds": ["UNREAD"] }))
            .send()
            .await
            .map_err(|e| MailStoreError::Transport(e.to_string()))?;
        check_status(response).await.map(|_| ())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, MailStoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(MailStoreError::Unauthorized);
    }
    let reason = response.text().await.unwrap_or_default();
    Err(MailStoreError::Status {
        status: status.as_u16(),
        reason,
    })
}

// ── Payload decoding ────────────────────────────────────────────────

/// Build a `Message` from a full-format Gmail payload, applying the
/// display placeholders for missing headers.
fn parse_message(id: &str, payload: &Value) -> Result<Message, MailStoreError> {
    let envelope = payload
        .get("payload")
        .ok_or_else(|| MailStoreError::Decode {
            id: id.to_string(),
            reason: "missing payload".into(),
        })?;

    let subject =
        header_value(envelope, "Subject").unwrap_or_else(|| "No Subject".to_string());
    let sender = header_value(envelope, "From").unwrap_or_else(|| "Unknown".to_string());
    let date = header_value(envelope, "Date").unwrap_or_default();

    let body = extract_body(envelope).map_err(|reason| MailStoreError::Decode {
        id: id.to_string(),
        reason,
    })?;

    Ok(Message {
        id: id.to_string(),
        sender,
        subject,
        body,
        date,
    })
}

fn header_value(envelope: &Value, name: &str) -> Option<String> {
    envelope
        .get("headers")?
        .as_array()?
        .iter()
        .find(|h| h.get("name").and_then(Value::as_str) == Some(name))
        .and_then(|h| h.get("value").and_then(Value::as_str))
        .map(String::from)
}

/// Extract the text/plain body. Multipart messages are scanned for the
/// first text/plain part with data; single-part messages use the
/// top-level body. No data at all decodes to an empty string.
fn extract_body(envelope: &Value) -> Result<String, String> {
    if let Some(parts) = envelope.get("parts").and_then(Value::as_array) {
        for part in parts {
            if part.get("mimeType").and_then(Value::as_str) != Some("text/plain") {
                continue;
            }
            if let Some(data) = part_data(part)
                && !data.is_empty()
            {
                return decode_body(data);
            }
        }
        return Ok(String::new());
    }

    match envelope
        .get("body")
        .and_then(|b| b.get("data"))
        .and_then(Value::as_str)
    {
        Some(data) if !data.is_empty() => decode_body(data),
        _ => Ok(String::new()),
    }
}

fn part_data(part: &Value) -> Option<&str> {
    part.get("body")?.get("data")?.as_str()
}

/// Gmail serves base64url with padding, but some payloads arrive
/// unpadded; accept both.
fn decode_body(data: &str) -> Result<String, String> {
    let bytes = URL_SAFE
        .decode(data)
        .or_else(|_| URL_SAFE_NO_PAD.decode(data))
        .map_err(|e| format!("base64: {e}"))?;
    String::from_utf8(bytes).map_err(|e| format!("utf-8: {e}"))
}
