//! Retrieval: what a principal gets for a start request
//!
//! Order of gates: ban list, channel membership, rate limit, verification,
//! then the parameter. Operators skip everything but the ban list. A parameter shaped like
//! a share code is looked up first; anything else (or an unknown code) is
//! tried as a link token.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::data::{self, Share, STAT_FILES_SHARED, STAT_SHARE_ACCESSED};
use crate::resilience::is_fresh;
use crate::share::{is_share_code, Selection, VERIFY_PREFIX};
use crate::tasks::DeleteReport;
use crate::transport::{ChatId, ItemId, LinkButton, TransportError};

use super::core::Depot;
use super::error::DepotError;

/// Items handed to a principal
#[derive(Debug)]
pub struct Delivery {
    /// Share code, `None` for link-token deliveries
    pub code: Option<String>,
    pub group_text: String,
    /// Ids of the copies in the principal's chat, in delivery order
    pub sent: Vec<ItemId>,
    /// Items that no longer exist in the storage channel
    pub skipped: usize,
    /// Pending deletion of the copies, when auto-delete is on
    pub auto_delete: Option<JoinHandle<DeleteReport>>,
}

/// Result of [`Depot::handle_start`]
#[derive(Debug)]
pub enum RetrievalOutcome {
    /// No parameter: plain greeting
    Welcome,
    Banned { reason: String },
    /// The principal has not joined every force-subscribe channel.
    /// `buttons` hold invite links for the missing ones; `retry` repeats
    /// the original request.
    JoinRequired {
        buttons: Vec<LinkButton>,
        retry: Option<String>,
    },
    RateLimited { wait_secs: u64 },
    /// Verification is on and the principal must open `link` first
    VerificationRequired { link: String },
    Verified,
    VerificationFailed,
    Delivered(Delivery),
    /// The share holds no items
    ShareEmpty,
    /// Every item of the share or range is gone from the channel
    ContentGone,
    NotFound,
    RangeTooLarge { requested: u64, max: u64 },
}

impl Depot {
    /// Handle a start request from `principal` with an optional parameter
    pub async fn handle_start(
        &self,
        principal: i64,
        param: Option<&str>,
    ) -> Result<RetrievalOutcome, DepotError> {
        self.check_running().await?;

        let ban = {
            let db = self.db.lock().await;
            data::get_ban(&db, principal)?
        };
        if let Some(ban) = ban {
            debug!(principal, "banned principal refused");
            return Ok(RetrievalOutcome::Banned { reason: ban.reason });
        }

        let operator = self.config.is_operator(principal);
        let param = param.map(str::trim).filter(|p| !p.is_empty());

        if !operator {
            let missing = self.unjoined_channels(principal).await;
            if !missing.is_empty() {
                debug!(principal, channels = missing.len(), "principal must join channels first");
                return Ok(RetrievalOutcome::JoinRequired {
                    buttons: self.join_buttons(&missing).await,
                    retry: param.map(|p| self.links.share_url(p)),
                });
            }
        }

        if !operator && !self.rate_limiter.check_and_record(principal) {
            let wait_secs = self.rate_limiter.wait_seconds(principal);
            debug!(principal, wait_secs, "start request rate limited");
            return Ok(RetrievalOutcome::RateLimited { wait_secs });
        }

        if let Some(token) = param.and_then(|p| p.strip_prefix(VERIFY_PREFIX)) {
            return Ok(if self.gate.confirm(principal, token).await? {
                RetrievalOutcome::Verified
            } else {
                RetrievalOutcome::VerificationFailed
            });
        }

        if self.config.verify_enabled && !operator && !self.ensure_fresh(principal).await? {
            let token = self.gate.issue(principal).await?;
            return Ok(RetrievalOutcome::VerificationRequired {
                link: self.verification_link(&token).await,
            });
        }

        let Some(param) = param else {
            return Ok(RetrievalOutcome::Welcome);
        };

        if is_share_code(param) {
            if let Some(share) = self.registry.get(param).await? {
                return self.deliver_share(principal, share).await;
            }
        }

        match self.codec.decode(param) {
            Ok(selection) => self.deliver_selection(principal, selection).await,
            Err(e) => {
                debug!(principal, error = %e, "start parameter is neither code nor token");
                Ok(RetrievalOutcome::NotFound)
            }
        }
    }

    /// Whether the principal holds a fresh verification; a stale one is reset
    async fn ensure_fresh(&self, principal: i64) -> Result<bool, DepotError> {
        let status = self.gate.status(principal).await?;
        if is_fresh(&status, self.config.verify_expire_secs, data::current_timestamp()) {
            return Ok(true);
        }
        if status.verified {
            self.gate.expire(principal).await?;
        }
        Ok(false)
    }

    /// Force-subscribe channels the principal is not in
    ///
    /// A failed lookup counts as not joined.
    async fn unjoined_channels(&self, principal: i64) -> Vec<ChatId> {
        let mut missing = Vec::new();
        for &channel in &self.config.force_sub_channels {
            match self.transport.is_member(channel, principal).await {
                Ok(true) => {}
                Ok(false) => missing.push(channel),
                Err(e) => {
                    warn!(channel, principal, error = %e, "membership check failed");
                    missing.push(channel);
                }
            }
        }
        missing
    }

    async fn join_buttons(&self, channels: &[ChatId]) -> Vec<LinkButton> {
        let mut buttons = Vec::with_capacity(channels.len());
        for &channel in channels {
            let cached = self.invite_links.lock().get(&channel).cloned();
            let url = match cached {
                Some(url) => url,
                None => match self.transport.invite_link(channel).await {
                    Ok(url) => {
                        self.invite_links.lock().insert(channel, url.clone());
                        url
                    }
                    Err(e) => {
                        warn!(channel, error = %e, "no invite link for channel");
                        continue;
                    }
                },
            };
            buttons.push(LinkButton::new(format!("Join channel {}", buttons.len() + 1), url));
        }
        buttons
    }

    /// Verification callback URL, shortened when a shortener is set
    async fn verification_link(&self, token: &str) -> String {
        let url = self.links.verify_url(token);
        let Some(shortener) = &self.shortener else {
            return url;
        };
        match shortener.shorten(&url).await {
            Ok(short) => short,
            Err(e) => {
                warn!(error = %e, "link shortener failed, handing out the plain link");
                url
            }
        }
    }

    async fn deliver_share(
        &self,
        principal: i64,
        share: Share,
    ) -> Result<RetrievalOutcome, DepotError> {
        if share.item_ids.is_empty() {
            return Ok(RetrievalOutcome::ShareEmpty);
        }
        self.registry.record_access(&share.code).await;
        self.bump_stat(STAT_SHARE_ACCESSED, 1).await;

        let outcome = self
            .deliver_items(principal, &share.item_ids, share.protect_content)
            .await?;
        Ok(match outcome {
            Some(mut delivery) => {
                info!(principal, code = %share.code, items = delivery.sent.len(), "share delivered");
                delivery.code = Some(share.code);
                delivery.group_text = share.group_text;
                RetrievalOutcome::Delivered(delivery)
            }
            None => RetrievalOutcome::ContentGone,
        })
    }

    async fn deliver_selection(
        &self,
        principal: i64,
        selection: Selection,
    ) -> Result<RetrievalOutcome, DepotError> {
        let requested = selection.len();
        if requested > self.config.max_link_range {
            return Ok(RetrievalOutcome::RangeTooLarge {
                requested,
                max: self.config.max_link_range,
            });
        }

        let ids = selection.ids();
        let outcome = self
            .deliver_items(principal, &ids, self.config.protect_content)
            .await?;
        Ok(match outcome {
            Some(delivery) => {
                info!(principal, items = delivery.sent.len(), "link delivered");
                RetrievalOutcome::Delivered(delivery)
            }
            None => RetrievalOutcome::ContentGone,
        })
    }

    /// Copy `items` from the storage channel to the principal
    ///
    /// Returns `None` when nothing could be copied.
    async fn deliver_items(
        &self,
        principal: i64,
        items: &[ItemId],
        protect: bool,
    ) -> Result<Option<Delivery>, DepotError> {
        let channel = self.config.channel_id;
        let mut sent = Vec::with_capacity(items.len());
        let mut skipped = 0;

        for &item in items {
            match self
                .transport
                .copy_content(channel, item, principal, protect)
                .await
            {
                Ok(copy) => sent.push(copy),
                Err(TransportError::Missing) => {
                    debug!(item, "item gone from channel, skipping");
                    skipped += 1;
                }
                Err(e) => {
                    warn!(item, principal, error = %e, "failed to deliver item");
                    skipped += 1;
                }
            }
        }

        if sent.is_empty() {
            return Ok(None);
        }
        self.bump_stat(STAT_FILES_SHARED, sent.len()).await;

        let auto_delete = match self.config.auto_delete_delay() {
            Some(delay) => Some(self.schedule_auto_delete(principal, sent.clone(), delay).await),
            None => None,
        };

        Ok(Some(Delivery {
            code: None,
            group_text: String::new(),
            sent,
            skipped,
            auto_delete,
        }))
    }

    async fn schedule_auto_delete(
        &self,
        principal: i64,
        sent: Vec<ItemId>,
        delay: Duration,
    ) -> JoinHandle<DeleteReport> {
        let text = format!(
            "These files will be deleted in {}. Save them somewhere else before then.",
            format_duration(delay)
        );
        let notice = match self.transport.send_content(principal, &text, None, &[]).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(principal, error = %e, "failed to send auto-delete notice");
                None
            }
        };
        self.auto_delete.schedule(principal, sent, notice, delay)
    }
}

/// "1 hour 30 minutes" style rendering, whole seconds
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let units = [(total / 3600, "hour"), (total % 3600 / 60, "minute"), (total % 60, "second")];

    let parts: Vec<String> = units
        .iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, unit)| {
            if *n == 1 {
                format!("1 {}", unit)
            } else {
                format!("{} {}s", n, unit)
            }
        })
        .collect();

    if parts.is_empty() {
        "0 seconds".to_string()
    } else {
        parts.join(" ")
    }
}
