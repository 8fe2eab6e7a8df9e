//! Console transport for the CLI
//!
//! Logs every call instead of talking to a messaging network.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tracing::info;

use depot_core::transport::{ChatId, ItemId, LinkButton, Transport, TransportError};

pub struct ConsoleTransport {
    next_id: AtomicI64,
}

impl ConsoleTransport {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1_000_000),
        }
    }

    fn fresh_id(&self) -> ItemId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

fn describe(buttons: &[LinkButton]) -> String {
    buttons
        .iter()
        .map(|b| format!("[{}]({})", b.label, b.url))
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl Transport for ConsoleTransport {
    async fn send_content(
        &self,
        chat: ChatId,
        text: &str,
        reply_to: Option<ItemId>,
        buttons: &[LinkButton],
    ) -> Result<ItemId, TransportError> {
        let id = self.fresh_id();
        info!(chat, id, ?reply_to, buttons = %describe(buttons), "send: {}", text);
        Ok(id)
    }

    async fn edit_controls(
        &self,
        chat: ChatId,
        item: ItemId,
        buttons: &[LinkButton],
    ) -> Result<(), TransportError> {
        info!(chat, item, buttons = %describe(buttons), "edit controls");
        Ok(())
    }

    async fn delete_content(&self, chat: ChatId, item: ItemId) -> Result<(), TransportError> {
        info!(chat, item, "delete");
        Ok(())
    }

    async fn copy_content(
        &self,
        from_chat: ChatId,
        item: ItemId,
        to_chat: ChatId,
        protect: bool,
    ) -> Result<ItemId, TransportError> {
        let id = self.fresh_id();
        info!(from_chat, item, to_chat, protect, id, "copy");
        Ok(id)
    }

    async fn is_member(&self, chat: ChatId, principal: ChatId) -> Result<bool, TransportError> {
        info!(chat, principal, "membership check");
        Ok(true)
    }

    async fn invite_link(&self, chat: ChatId) -> Result<String, TransportError> {
        Ok(format!("https://t.me/c/{}", chat.unsigned_abs()))
    }
}
