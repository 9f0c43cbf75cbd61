use serde::{Deserialize, Serialize};

use crate::models::{ChannelId, ConversationId, Message, MessageId};

/// Selects one message stream. Exactly one selector per query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum MessageFilter {
    /// Top-level messages of a channel (thread replies excluded).
    Channel(ChannelId),
    /// Top-level messages of a direct conversation.
    Conversation(ConversationId),
    /// Replies to one thread root.
    Thread(MessageId),
}

/// Sort key of a message in a feed: creation time, then id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageCursor {
    pub created_at_ms: i64,
    pub id: MessageId,
}

impl PageCursor {
    pub fn of(message: &Message) -> Self {
        Self {
            created_at_ms: message.created_at.timestamp_millis(),
            id: message.id,
        }
    }
}

/// Key range covered by one page, newest end first.
///
/// `before` is exclusive and `until` inclusive. A page whose `until` is not
/// yet known is open-ended and bounded only by the page size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRange {
    pub before: Option<PageCursor>,
    pub until: Option<PageCursor>,
}

impl PageRange {
    pub fn contains(&self, key: &PageCursor) -> bool {
        self.before.is_none_or(|before| *key < before) && self.until.is_none_or(|until| *key >= until)
    }
}

/// Request for the content of one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub filter: MessageFilter,
    pub index: usize,
    pub range: PageRange,
    pub page_size: usize,
}

/// Current content of one page as reported by the backend.
///
/// Items are newest-first. `range` is the resolved range: once a page has
/// been filled its `until` bound is fixed so later snapshots cover the same
/// keys. `is_done` means nothing older than this page exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot<T> {
    pub index: usize,
    pub range: PageRange,
    pub items: Vec<T>,
    pub is_done: bool,
}
