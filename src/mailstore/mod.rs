//! Mail store boundary: fetching unread messages and marking them read.
//!
//! Pure I/O, no triage logic. Decoding and header defaults happen here
//! so the pipeline only ever sees complete `Message` values.

mod gmail;

pub use gmail::GmailStore;

use async_trait::async_trait;

use crate::error::MailStoreError;
use crate::pipeline::types::Message;

/// Read-side mail store operations the service needs.
///
/// Implementations authenticate with a caller-supplied access token; the
/// token is passed through upstream, never validated locally.
#[async_trait]
pub trait MailStore: Send + Sync {
    /// Fetch up to `max` unread messages. An individual message that
    /// fails to load or decode is skipped; only a failing listing aborts.
    async fn fetch_unread(
        &self,
        access_token: &str,
        max: usize,
    ) -> Result<Vec<Message>, MailStoreError>;

    /// Mark one message as read.
    async fn mark_read(&self, access_token: &str, message_id: &str)
    -> Result<(), MailStoreError>;
}
