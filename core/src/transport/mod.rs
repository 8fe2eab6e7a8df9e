//! Messaging transport interface
//!
//! Depot never talks to the messaging network itself. Sending, editing,
//! copying and deleting content, as well as channel membership lookups,
//! go through [`Transport`], implemented
//! by the embedding application (and by `testing::MockTransport`).
//! Flood-control backoff belongs to the implementation; Depot simply
//! awaits each call and treats failures as recoverable.

use async_trait::async_trait;

/// Identifier of a content item (a message) within a chat
pub type ItemId = i64;

/// Identifier of a chat, channel or user
pub type ChatId = i64;

/// A URL button attached to a content item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkButton {
    pub label: String,
    pub url: String,
}

impl LinkButton {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
        }
    }
}

/// Errors reported by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The target item does not exist (already deleted or never existed)
    Missing,
    /// The network refused the operation (e.g. item not editable)
    Rejected(String),
    /// Transient failure (network, rate limit exhausted, ...)
    Unavailable(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Missing => write!(f, "item not found"),
            TransportError::Rejected(e) => write!(f, "rejected: {}", e),
            TransportError::Unavailable(e) => write!(f, "transport unavailable: {}", e),
        }
    }
}

impl std::error::Error for TransportError {}

/// Operations Depot needs from the messaging network
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a text message, optionally as a reply, returning the new item id
    async fn send_content(
        &self,
        chat: ChatId,
        text: &str,
        reply_to: Option<ItemId>,
        buttons: &[LinkButton],
    ) -> Result<ItemId, TransportError>;

    /// Replace the buttons attached to an existing item
    async fn edit_controls(
        &self,
        chat: ChatId,
        item: ItemId,
        buttons: &[LinkButton],
    ) -> Result<(), TransportError>;

    /// Delete an item
    async fn delete_content(&self, chat: ChatId, item: ItemId) -> Result<(), TransportError>;

    /// Copy an item into another chat, returning the copy's id
    async fn copy_content(
        &self,
        from_chat: ChatId,
        item: ItemId,
        to_chat: ChatId,
        protect: bool,
    ) -> Result<ItemId, TransportError>;

    /// Whether `principal` is currently a member of `chat`
    ///
    /// Owners and administrators count as members.
    async fn is_member(&self, chat: ChatId, principal: ChatId) -> Result<bool, TransportError>;

    /// Invite link for `chat`
    async fn invite_link(&self, chat: ChatId) -> Result<String, TransportError>;
}
