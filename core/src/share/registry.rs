//! Share registry
//!
//! Owns share records: collision-free code allocation, lookups by code,
//! item and keyword, and in-place mutation. Authorization is the caller's
//! concern.

use std::sync::Arc;

use rusqlite::Connection;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::data::{self, current_timestamp, Share, SharePatch, STAT_LINKS_GENERATED};
use crate::service::DepotError;
use crate::transport::ItemId;

use super::code::CodeGenerator;

/// How the title of a new share is chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareTitle {
    /// Use this title as-is (may be empty)
    Given(String),
    /// `<prefix>-<code>`, filled in once the code is known
    Generated(&'static str),
}

/// Title prefix for album shares
pub const ALBUM_TITLE: &str = "Album";
/// Title prefix for single-item shares
pub const FILE_TITLE: &str = "File";
/// Title prefix for manual session shares
pub const SESSION_TITLE: &str = "Share";

/// Input for [`ShareRegistry::create`]
#[derive(Debug, Clone)]
pub struct NewShare {
    pub owner_id: i64,
    /// Items in delivery order (must be non-empty)
    pub item_ids: Vec<ItemId>,
    pub title: ShareTitle,
    pub protect_content: bool,
    pub group_text: String,
    pub keywords: Vec<String>,
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Code-to-content registry backed by the database
#[derive(Clone)]
pub struct ShareRegistry {
    db: Arc<Mutex<Connection>>,
    codes: CodeGenerator,
    max_attempts: u32,
}

impl ShareRegistry {
    pub fn new(db: Arc<Mutex<Connection>>, codes: CodeGenerator, max_attempts: u32) -> Self {
        Self {
            db,
            codes,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Mint a share under a fresh, unused code
    ///
    /// Candidates that already exist (or lose an insert race) are replaced
    /// with new ones, up to the configured attempt cap.
    pub async fn create(&self, new: NewShare) -> Result<Share, DepotError> {
        if new.item_ids.is_empty() {
            return Err(DepotError::InvalidInput("a share needs at least one item".to_string()));
        }

        for attempt in 1..=self.max_attempts {
            let code = self.codes.generate();
            let title = match &new.title {
                ShareTitle::Given(title) => title.clone(),
                ShareTitle::Generated(prefix) => format!("{}-{}", prefix, code),
            };
            let now = current_timestamp();
            let share = Share {
                code,
                owner_id: new.owner_id,
                item_ids: new.item_ids.clone(),
                title,
                group_text: new.group_text.clone(),
                keywords: new.keywords.clone(),
                protect_content: new.protect_content,
                access_count: 0,
                created_at: now,
                updated_at: now,
            };

            let db = self.db.lock().await;
            if data::share_exists(&db, &share.code)? {
                debug!(attempt, "share code collision, retrying");
                continue;
            }
            match data::insert_share(&db, &share) {
                Ok(()) => {}
                Err(e) if is_constraint_violation(&e) => {
                    debug!(attempt, "share code taken during insert, retrying");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
            if let Err(e) = data::increment_stat(&db, STAT_LINKS_GENERATED, 1) {
                warn!(error = %e, "failed to count created share");
            }
            drop(db);

            info!(
                code = %share.code,
                items = share.item_ids.len(),
                owner = share.owner_id,
                "share created"
            );
            return Ok(share);
        }

        warn!(attempts = self.max_attempts, "share code space exhausted");
        Err(DepotError::Exhausted {
            attempts: self.max_attempts,
        })
    }

    /// Look up a share by code
    pub async fn get(&self, code: &str) -> Result<Option<Share>, DepotError> {
        let db = self.db.lock().await;
        Ok(data::get_share(&db, code)?)
    }

    /// The share already containing `item`, if any
    pub async fn find_by_item(&self, item: ItemId) -> Result<Option<Share>, DepotError> {
        let db = self.db.lock().await;
        Ok(data::find_share_by_item(&db, item)?)
    }

    /// Shares tagged with `keyword`, most recent first
    pub async fn find_by_keyword(&self, keyword: &str, limit: usize) -> Result<Vec<Share>, DepotError> {
        let db = self.db.lock().await;
        Ok(data::find_shares_by_keyword(&db, keyword, limit)?)
    }

    /// Shares whose title contains `query`
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<Share>, DepotError> {
        let db = self.db.lock().await;
        Ok(data::search_shares(&db, query, limit)?)
    }

    /// Count one access. Best-effort: failures and unknown codes are only logged.
    pub async fn record_access(&self, code: &str) {
        let db = self.db.lock().await;
        match data::increment_share_access(&db, code) {
            Ok(true) => {}
            Ok(false) => debug!(code = %code, "access recorded for missing share"),
            Err(e) => warn!(code = %code, error = %e, "failed to record share access"),
        }
    }

    /// Apply a partial update, returning the updated share
    pub async fn update(&self, code: &str, patch: &SharePatch) -> Result<Share, DepotError> {
        let db = self.db.lock().await;
        if !patch.is_empty() && !data::update_share(&db, code, patch)? {
            return Err(DepotError::NotFound(code.to_string()));
        }
        data::get_share(&db, code)?.ok_or_else(|| DepotError::NotFound(code.to_string()))
    }

    /// Delete a share
    pub async fn delete(&self, code: &str) -> Result<(), DepotError> {
        let db = self.db.lock().await;
        if !data::delete_share(&db, code)? {
            return Err(DepotError::NotFound(code.to_string()));
        }
        info!(code = %code, "share deleted");
        Ok(())
    }

    /// One page of an owner's shares plus the owner's total
    pub async fn list_by_owner(
        &self,
        owner_id: i64,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<Share>, u64), DepotError> {
        let db = self.db.lock().await;
        Ok(data::list_shares_by_owner(&db, owner_id, page, per_page)?)
    }

    /// Total number of shares
    pub async fn count(&self) -> Result<u64, DepotError> {
        let db = self.db.lock().await;
        Ok(data::count_shares(&db)?)
    }
}
