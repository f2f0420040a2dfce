use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{EarliestMessage, MailError, RawMessage};

/// One page of messages, ordered by received time ascending. Pages may carry
/// headers only; [`MailSource::fetch_message`] returns the full message.
#[derive(Debug, Clone, Default)]
pub struct MessagePage {
    pub messages: Vec<RawMessage>,
    /// Opaque cursor for the next page; `None` on the last page.
    pub next: Option<String>,
}

/// A paginated, finite view of a mailbox.
#[async_trait]
pub trait MailSource: Send + Sync {
    /// Fetches the page at `cursor`, or the first page of messages received
    /// at or after `since` when `cursor` is `None`.
    async fn fetch_page(
        &self,
        since: DateTime<Utc>,
        cursor: Option<&str>,
    ) -> Result<MessagePage, MailError>;

    /// Fetches one message with its body. `None` if it no longer exists.
    async fn fetch_message(&self, message_id: &str) -> Result<Option<RawMessage>, MailError>;

    /// The earliest message in a conversation, if the provider can say.
    async fn earliest_in_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Option<EarliestMessage>, MailError>;
}
