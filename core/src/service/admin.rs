//! Channel intake, discovery and operator operations

use tracing::{debug, info};

use crate::data::{self, BanEntry, Share, SharePatch};
use crate::share::{normalize_keywords, SessionDraft, Selection};
use crate::tasks::ArrivedItem;
use crate::transport::{ChatId, ItemId};

use super::core::Depot;
use super::error::DepotError;
use super::events::{emit, DepotEvent, ShareOrigin};

/// A keyword match with its retrieval link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordHit {
    pub share: Share,
    pub link: String,
}

/// One page of an owner's shares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharePage {
    pub shares: Vec<Share>,
    /// 1-based page number
    pub page: u32,
    pub total: u64,
    pub pages: u64,
}

impl Depot {
    /// Feed a post from the storage channel into album aggregation
    pub async fn on_channel_post(
        &self,
        group_key: Option<&str>,
        item: ArrivedItem,
    ) -> Result<Option<Share>, DepotError> {
        self.check_running().await?;
        self.aggregator.on_item_arrived(group_key, item).await
    }

    /// Shares tagged with `keyword`, most recent first
    pub async fn lookup_keyword(&self, keyword: &str) -> Result<Vec<KeywordHit>, DepotError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Ok(Vec::new());
        }
        let shares = self
            .registry
            .find_by_keyword(keyword, self.config.keyword_result_limit)
            .await?;
        debug!(keyword, hits = shares.len(), "keyword lookup");

        Ok(shares
            .into_iter()
            .map(|share| KeywordHit {
                link: self.links.share_url(&share.code),
                share,
            })
            .collect())
    }

    /// Shares whose title contains `query`
    pub async fn search_shares(&self, query: &str) -> Result<Vec<Share>, DepotError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.registry
            .search(query, self.config.keyword_result_limit)
            .await
    }

    /// Retrieval URL for one channel item, or an inclusive range
    pub fn generate_link(&self, first: ItemId, last: Option<ItemId>) -> Result<String, DepotError> {
        if first <= 0 || last.is_some_and(|last| last <= 0) {
            return Err(DepotError::InvalidInput("item ids must be positive".to_string()));
        }
        let selection = match last {
            Some(last) if last != first => Selection::Range { first, last },
            _ => Selection::Single(first),
        };
        Ok(self.links.share_url(&self.codec.encode(selection)))
    }

    /// Apply `patch` to a share owned by `actor` (operators may edit any)
    pub async fn update_share(
        &self,
        actor: i64,
        code: &str,
        mut patch: SharePatch,
    ) -> Result<Share, DepotError> {
        self.authorize(actor, code).await?;
        if let Some(keywords) = patch.keywords.take() {
            patch.keywords = Some(normalize_keywords(keywords));
        }
        let share = self.registry.update(code, &patch).await?;
        info!(actor, code = %code, "share updated");
        Ok(share)
    }

    /// Delete a share owned by `actor` (operators may delete any)
    pub async fn delete_share(&self, actor: i64, code: &str) -> Result<(), DepotError> {
        self.authorize(actor, code).await?;
        self.registry.delete(code).await
    }

    async fn authorize(&self, actor: i64, code: &str) -> Result<Share, DepotError> {
        let share = self
            .registry
            .get(code)
            .await?
            .ok_or_else(|| DepotError::NotFound(code.to_string()))?;
        if share.owner_id != actor && !self.config.is_operator(actor) {
            debug!(actor, code = %code, "share mutation refused");
            return Err(DepotError::Unauthorized);
        }
        Ok(share)
    }

    /// Page `page` (1-based) of `owner`'s shares, most recent first
    pub async fn list_shares(&self, owner: i64, page: u32) -> Result<SharePage, DepotError> {
        let page = page.max(1);
        let per_page = self.config.shares_per_page.max(1);
        let (shares, total) = self.registry.list_by_owner(owner, page, per_page).await?;
        Ok(SharePage {
            shares,
            page,
            total,
            pages: total.div_ceil(u64::from(per_page)),
        })
    }

    /// Ban `principal` from retrieval. Only operators ban; operators can't be banned.
    pub async fn ban(&self, actor: i64, principal: i64, reason: &str) -> Result<(), DepotError> {
        self.require_operator(actor)?;
        if self.config.is_operator(principal) {
            return Err(DepotError::InvalidInput("operators cannot be banned".to_string()));
        }
        let db = self.db.lock().await;
        data::ban_user(&db, principal, reason.trim())?;
        info!(actor, principal, "principal banned");
        Ok(())
    }

    /// Lift a ban. Returns false if `principal` wasn't banned.
    pub async fn unban(&self, actor: i64, principal: i64) -> Result<bool, DepotError> {
        self.require_operator(actor)?;
        let db = self.db.lock().await;
        let lifted = data::unban_user(&db, principal)?;
        if lifted {
            info!(actor, principal, "principal unbanned");
        }
        Ok(lifted)
    }

    pub async fn list_bans(&self) -> Result<Vec<BanEntry>, DepotError> {
        let db = self.db.lock().await;
        Ok(data::list_bans(&db)?)
    }

    fn require_operator(&self, actor: i64) -> Result<(), DepotError> {
        if self.config.is_operator(actor) {
            Ok(())
        } else {
            Err(DepotError::Unauthorized)
        }
    }

    // Manual share sessions

    pub fn start_session(&self, actor: i64, protect_content: bool) -> Result<(), DepotError> {
        self.require_operator(actor)?;
        self.sessions.start(actor, protect_content);
        debug!(actor, "share session opened");
        Ok(())
    }

    /// Copy `item` from `source_chat` into the storage channel and add the
    /// copy to `actor`'s session. Returns the session's item count.
    pub async fn session_add(
        &self,
        actor: i64,
        source_chat: ChatId,
        item: ItemId,
    ) -> Result<usize, DepotError> {
        if self.sessions.draft(actor).is_none() {
            return Err(DepotError::NotFound(format!("no open share session for {}", actor)));
        }
        let stored = self
            .transport
            .copy_content(source_chat, item, self.config.channel_id, false)
            .await?;
        self.sessions.add_item(actor, stored)
    }

    pub fn session_set_title(&self, actor: i64, title: &str) -> Result<(), DepotError> {
        self.sessions.set_title(actor, title)
    }

    pub fn session_toggle_protect(&self, actor: i64) -> Result<bool, DepotError> {
        self.sessions.toggle_protect(actor)
    }

    pub fn session_draft(&self, actor: i64) -> Option<SessionDraft> {
        self.sessions.draft(actor)
    }

    pub fn cancel_session(&self, actor: i64) -> bool {
        self.sessions.cancel(actor)
    }

    /// Complete `actor`'s session into a share
    pub async fn complete_session(&self, actor: i64) -> Result<Share, DepotError> {
        self.check_running().await?;
        let share = self.sessions.complete(actor).await?;
        emit(
            &self.event_tx,
            DepotEvent::ShareCreated {
                share: share.clone(),
                origin: ShareOrigin::Session,
            },
        );
        Ok(share)
    }
}
