//! Recording transport - stands in for the messaging network
//!
//! Every content call is recorded in order. Edits can be rejected
//! wholesale, individual items can be marked missing or undeletable.
//! Nobody is a channel member until added with [`MockTransport::add_member`].

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::transport::{ChatId, ItemId, LinkButton, Transport, TransportError};

/// First id handed out for sent or copied items
const FIRST_MOCK_ID: ItemId = 10_000;

/// A recorded transport call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Send {
        chat: ChatId,
        text: String,
        reply_to: Option<ItemId>,
        buttons: Vec<LinkButton>,
    },
    Edit {
        chat: ChatId,
        item: ItemId,
        buttons: Vec<LinkButton>,
    },
    Delete {
        chat: ChatId,
        item: ItemId,
    },
    Copy {
        from_chat: ChatId,
        item: ItemId,
        to_chat: ChatId,
        protect: bool,
    },
}

/// In-memory [`Transport`] that records calls
#[derive(Debug)]
pub struct MockTransport {
    calls: Mutex<Vec<TransportCall>>,
    next_id: AtomicI64,
    reject_edits: AtomicBool,
    missing: Mutex<HashSet<ItemId>>,
    undeletable: Mutex<HashSet<ItemId>>,
    members: Mutex<HashSet<(ChatId, ChatId)>>,
    unreachable_chats: Mutex<HashSet<ChatId>>,
    invite_requests: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(FIRST_MOCK_ID),
            reject_edits: AtomicBool::new(false),
            missing: Mutex::new(HashSet::new()),
            undeletable: Mutex::new(HashSet::new()),
            members: Mutex::new(HashSet::new()),
            unreachable_chats: Mutex::new(HashSet::new()),
            invite_requests: AtomicUsize::new(0),
        }
    }

    /// Make every `edit_controls` call fail with `Rejected`
    pub fn set_reject_edits(&self, reject: bool) {
        self.reject_edits.store(reject, Ordering::SeqCst);
    }

    /// Treat `item` as gone: copies and deletes report `Missing`
    pub fn mark_missing(&self, item: ItemId) {
        self.missing.lock().insert(item);
    }

    /// Make deleting `item` fail with `Unavailable`
    pub fn fail_delete(&self, item: ItemId) {
        self.undeletable.lock().insert(item);
    }

    /// Make `principal` a member of `chat`
    pub fn add_member(&self, chat: ChatId, principal: ChatId) {
        self.members.lock().insert((chat, principal));
    }

    /// Make membership checks and invite links for `chat` fail with `Unavailable`
    pub fn make_unreachable(&self, chat: ChatId) {
        self.unreachable_chats.lock().insert(chat);
    }

    /// Number of `invite_link` calls so far
    pub fn invite_requests(&self) -> usize {
        self.invite_requests.load(Ordering::SeqCst)
    }

    /// All calls so far, in order
    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().clone()
    }

    pub fn sends(&self) -> Vec<TransportCall> {
        self.filter(|c| matches!(c, TransportCall::Send { .. }))
    }

    pub fn edits(&self) -> Vec<TransportCall> {
        self.filter(|c| matches!(c, TransportCall::Edit { .. }))
    }

    /// Items deleted (or attempted), in order
    pub fn deleted_items(&self) -> Vec<ItemId> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                TransportCall::Delete { item, .. } => Some(*item),
                _ => None,
            })
            .collect()
    }

    /// Items copied, in order, with their protect flag
    pub fn copied_items(&self) -> Vec<(ItemId, bool)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                TransportCall::Copy { item, protect, .. } => Some((*item, *protect)),
                _ => None,
            })
            .collect()
    }

    fn filter(&self, pred: impl Fn(&TransportCall) -> bool) -> Vec<TransportCall> {
        self.calls.lock().iter().filter(|c| pred(c)).cloned().collect()
    }

    fn record(&self, call: TransportCall) {
        self.calls.lock().push(call);
    }

    fn fresh_id(&self) -> ItemId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_content(
        &self,
        chat: ChatId,
        text: &str,
        reply_to: Option<ItemId>,
        buttons: &[LinkButton],
    ) -> Result<ItemId, TransportError> {
        self.record(TransportCall::Send {
            chat,
            text: text.to_string(),
            reply_to,
            buttons: buttons.to_vec(),
        });
        Ok(self.fresh_id())
    }

    async fn edit_controls(
        &self,
        chat: ChatId,
        item: ItemId,
        buttons: &[LinkButton],
    ) -> Result<(), TransportError> {
        self.record(TransportCall::Edit {
            chat,
            item,
            buttons: buttons.to_vec(),
        });
        if self.reject_edits.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected("message can't be edited".to_string()));
        }
        Ok(())
    }

    async fn delete_content(&self, chat: ChatId, item: ItemId) -> Result<(), TransportError> {
        self.record(TransportCall::Delete { chat, item });
        if self.undeletable.lock().contains(&item) {
            return Err(TransportError::Unavailable("delete failed".to_string()));
        }
        if !self.missing.lock().insert(item) {
            return Err(TransportError::Missing);
        }
        Ok(())
    }

    async fn copy_content(
        &self,
        from_chat: ChatId,
        item: ItemId,
        to_chat: ChatId,
        protect: bool,
    ) -> Result<ItemId, TransportError> {
        self.record(TransportCall::Copy {
            from_chat,
            item,
            to_chat,
            protect,
        });
        if self.missing.lock().contains(&item) {
            return Err(TransportError::Missing);
        }
        Ok(self.fresh_id())
    }

    async fn is_member(&self, chat: ChatId, principal: ChatId) -> Result<bool, TransportError> {
        if self.unreachable_chats.lock().contains(&chat) {
            return Err(TransportError::Unavailable("chat not reachable".to_string()));
        }
        Ok(self.members.lock().contains(&(chat, principal)))
    }

    async fn invite_link(&self, chat: ChatId) -> Result<String, TransportError> {
        self.invite_requests.fetch_add(1, Ordering::SeqCst);
        if self.unreachable_chats.lock().contains(&chat) {
            return Err(TransportError::Unavailable("chat not reachable".to_string()));
        }
        Ok(format!("https://t.me/+invite{}", chat.unsigned_abs()))
    }
}
