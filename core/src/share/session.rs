//! Manual share sessions
//!
//! An operator opens a session, adds items one at a time, optionally sets
//! a title and protection, then completes it into a share. One open
//! session per owner; opening again starts over.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::data::Share;
use crate::service::DepotError;
use crate::transport::ItemId;

use super::registry::{NewShare, ShareRegistry, ShareTitle, SESSION_TITLE};

/// An open session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionDraft {
    /// Storage-channel items collected so far, in order
    pub item_ids: Vec<ItemId>,
    /// Empty means "generate one on completion"
    pub title: String,
    pub protect_content: bool,
}

/// Open sessions, keyed by owner
pub struct ShareSessions {
    registry: ShareRegistry,
    drafts: Mutex<HashMap<i64, SessionDraft>>,
}

fn no_session(owner_id: i64) -> DepotError {
    DepotError::NotFound(format!("no open share session for {}", owner_id))
}

impl ShareSessions {
    pub fn new(registry: ShareRegistry) -> Self {
        Self {
            registry,
            drafts: Mutex::new(HashMap::new()),
        }
    }

    /// Open (or restart) a session for `owner_id`
    pub fn start(&self, owner_id: i64, protect_content: bool) {
        let draft = SessionDraft {
            protect_content,
            ..Default::default()
        };
        if self.drafts.lock().insert(owner_id, draft).is_some() {
            debug!(owner = owner_id, "share session restarted");
        }
    }

    /// Add an item; returns the number of items collected
    pub fn add_item(&self, owner_id: i64, item: ItemId) -> Result<usize, DepotError> {
        let mut drafts = self.drafts.lock();
        let draft = drafts.get_mut(&owner_id).ok_or_else(|| no_session(owner_id))?;
        draft.item_ids.push(item);
        Ok(draft.item_ids.len())
    }

    pub fn set_title(&self, owner_id: i64, title: &str) -> Result<(), DepotError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(DepotError::InvalidInput("title cannot be empty".to_string()));
        }
        let mut drafts = self.drafts.lock();
        let draft = drafts.get_mut(&owner_id).ok_or_else(|| no_session(owner_id))?;
        draft.title = title.to_string();
        Ok(())
    }

    /// Flip the protection flag; returns the new value
    pub fn toggle_protect(&self, owner_id: i64) -> Result<bool, DepotError> {
        let mut drafts = self.drafts.lock();
        let draft = drafts.get_mut(&owner_id).ok_or_else(|| no_session(owner_id))?;
        draft.protect_content = !draft.protect_content;
        Ok(draft.protect_content)
    }

    /// Snapshot of an open session
    pub fn draft(&self, owner_id: i64) -> Option<SessionDraft> {
        self.drafts.lock().get(&owner_id).cloned()
    }

    /// Drop a session. Returns false if none was open.
    pub fn cancel(&self, owner_id: i64) -> bool {
        self.drafts.lock().remove(&owner_id).is_some()
    }

    /// Turn the session into a share
    ///
    /// The session is closed on success. On failure it stays open with
    /// its items, so the owner can retry.
    pub async fn complete(&self, owner_id: i64) -> Result<Share, DepotError> {
        let draft = {
            let mut drafts = self.drafts.lock();
            let draft = drafts.get(&owner_id).ok_or_else(|| no_session(owner_id))?;
            if draft.item_ids.is_empty() {
                return Err(DepotError::InvalidInput("no items added yet".to_string()));
            }
            drafts.remove(&owner_id).ok_or_else(|| no_session(owner_id))?
        };

        let title = if draft.title.is_empty() {
            ShareTitle::Generated(SESSION_TITLE)
        } else {
            ShareTitle::Given(draft.title.clone())
        };
        let result = self
            .registry
            .create(NewShare {
                owner_id,
                item_ids: draft.item_ids.clone(),
                title,
                protect_content: draft.protect_content,
                group_text: String::new(),
                keywords: Vec::new(),
            })
            .await;

        match result {
            Ok(share) => {
                info!(owner = owner_id, code = %share.code, "share session completed");
                Ok(share)
            }
            Err(e) => {
                // Don't clobber a session reopened while we were creating
                self.drafts.lock().entry(owner_id).or_insert(draft);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::start_memory_db;
    use crate::share::code::CodeGenerator;
    use std::sync::Arc;

    fn sessions() -> ShareSessions {
        let db = Arc::new(tokio::sync::Mutex::new(start_memory_db().unwrap()));
        ShareSessions::new(ShareRegistry::new(db, CodeGenerator::default(), 16))
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let sessions = sessions();
        sessions.start(7, false);
        assert_eq!(sessions.add_item(7, 300).unwrap(), 1);
        assert_eq!(sessions.add_item(7, 301).unwrap(), 2);
        assert!(sessions.toggle_protect(7).unwrap());
        sessions.set_title(7, "  Holiday ").unwrap();

        let share = sessions.complete(7).await.unwrap();
        assert_eq!(share.item_ids, vec![300, 301]);
        assert_eq!(share.title, "Holiday");
        assert!(share.protect_content);
        assert_eq!(share.owner_id, 7);
        assert!(share.keywords.is_empty());

        // Session is closed afterwards
        assert!(sessions.draft(7).is_none());
        assert!(matches!(sessions.add_item(7, 1), Err(DepotError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_default_title_uses_code() {
        let sessions = sessions();
        sessions.start(7, true);
        sessions.add_item(7, 1).unwrap();
        let share = sessions.complete(7).await.unwrap();
        assert_eq!(share.title, format!("Share-{}", share.code));
        assert!(share.protect_content);
    }

    #[tokio::test]
    async fn test_empty_session_cannot_complete() {
        let sessions = sessions();
        sessions.start(7, false);
        assert!(matches!(
            sessions.complete(7).await,
            Err(DepotError::InvalidInput(_))
        ));
        // Still open
        assert!(sessions.draft(7).is_some());
        assert!(matches!(
            sessions.complete(8).await,
            Err(DepotError::NotFound(_))
        ));
    }

    #[test]
    fn test_restart_and_cancel() {
        let sessions = sessions();
        sessions.start(7, false);
        sessions.add_item(7, 1).unwrap();
        sessions.start(7, false);
        assert!(sessions.draft(7).unwrap().item_ids.is_empty());

        assert!(sessions.cancel(7));
        assert!(!sessions.cancel(7));
        assert!(sessions.set_title(7, "x").is_err());
    }
}
