//! Album burst aggregation
//!
//! Items of one album arrive as independent posts with a shared group key
//! and no end marker. Each arrival appends to the group's pending batch
//! and restarts a quiet-period timer; when a timer survives the full
//! quiet period the batch is taken and turned into one share.
//!
//! Locking is per group key. The outer map lock is held only to find,
//! create or remove a batch handle; appends and timer swaps happen under
//! the batch's own lock. Neither lock is ever held across an await.
//!
//! Cancelling a superseded timer only works while it is still sleeping.
//! A timer that already woke up finalizes whatever the batch holds, and a
//! later timer for the same key then starts a new batch. The duplicate
//! check on the first item stops such a batch from re-sharing content.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::data::Share;
use crate::service::events::{emit, DepotEvent, ShareOrigin};
use crate::service::DepotError;
use crate::share::{
    derive_keywords, NewShare, ShareLinks, ShareRegistry, ShareTitle, ALBUM_TITLE, FILE_TITLE,
};
use crate::transport::{ChatId, ItemId, LinkButton, Transport};

/// A content item posted to the storage channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrivedItem {
    pub id: ItemId,
    /// Caption or text of the post, if any
    pub text: Option<String>,
}

impl ArrivedItem {
    pub fn new(id: ItemId) -> Self {
        Self { id, text: None }
    }

    pub fn with_text(id: ItemId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: Some(text.into()),
        }
    }
}

/// Settings for [`BurstAggregator`]
#[derive(Debug, Clone)]
pub struct AggregatorSettings {
    /// Storage channel the items live in (also the share owner)
    pub channel_id: ChatId,
    /// Silence after the latest arrival before a batch is final
    pub quiet_period: Duration,
    /// Announce links as replies instead of editing the first item
    pub disable_channel_button: bool,
}

#[derive(Debug, Default)]
struct PendingBatch {
    /// Items tagged with their arrival sequence number
    items: Vec<(u64, ArrivedItem)>,
    /// Timer of the latest arrival
    timer: Option<CancellationToken>,
    /// Set once a finalize took the items; arrivals must start a new batch
    closed: bool,
}

type BatchSlot = Arc<Mutex<PendingBatch>>;

/// Items in arrival-sequence order
fn sorted_items(mut items: Vec<(u64, ArrivedItem)>) -> Vec<ArrivedItem> {
    items.sort_by_key(|(seq, _)| *seq);
    items.into_iter().map(|(_, item)| item).collect()
}

struct Inner {
    pending: Mutex<HashMap<String, BatchSlot>>,
    sequence: AtomicU64,
    registry: ShareRegistry,
    transport: Arc<dyn Transport>,
    links: ShareLinks,
    event_tx: mpsc::Sender<DepotEvent>,
    settings: AggregatorSettings,
}

/// Groups bursts of channel posts into shares
#[derive(Clone)]
pub struct BurstAggregator {
    inner: Arc<Inner>,
}

impl BurstAggregator {
    pub fn new(
        registry: ShareRegistry,
        transport: Arc<dyn Transport>,
        links: ShareLinks,
        event_tx: mpsc::Sender<DepotEvent>,
        settings: AggregatorSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                pending: Mutex::new(HashMap::new()),
                sequence: AtomicU64::new(0),
                registry,
                transport,
                links,
                event_tx,
                settings,
            }),
        }
    }

    /// Handle a new channel post
    ///
    /// Grouped items are buffered and `Ok(None)` is returned; the share
    /// appears later. An ungrouped item is finalized right away and its
    /// share returned (`None` if the item was already shared).
    pub async fn on_item_arrived(
        &self,
        group_key: Option<&str>,
        item: ArrivedItem,
    ) -> Result<Option<Share>, DepotError> {
        match group_key {
            None => self.inner.finalize(vec![item], ShareOrigin::Single).await,
            Some(key) => {
                self.buffer(key, item);
                Ok(None)
            }
        }
    }

    /// Number of groups still waiting for their quiet period
    pub fn pending_groups(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Finalize every pending batch now, without waiting for its quiet
    /// period. Returns how many batches were taken.
    pub async fn flush(&self) -> usize {
        let drained: Vec<(String, BatchSlot)> = self.inner.pending.lock().drain().collect();
        let mut taken = 0;
        for (key, slot) in drained {
            let items = {
                let mut batch = slot.lock();
                batch.closed = true;
                if let Some(timer) = batch.timer.take() {
                    timer.cancel();
                }
                sorted_items(std::mem::take(&mut batch.items))
            };
            if items.is_empty() {
                continue;
            }
            taken += 1;
            debug!(group = %key, items = items.len(), "flushing pending album");
            if let Err(e) = self
                .inner
                .finalize(items, ShareOrigin::Album { group_key: key.clone() })
                .await
            {
                warn!(group = %key, error = %e, "failed to finalize flushed album");
            }
        }
        taken
    }

    fn buffer(&self, key: &str, item: ArrivedItem) {
        let seq = self.inner.sequence.fetch_add(1, Ordering::SeqCst);
        let mut item = Some(item);

        loop {
            let slot = self
                .inner
                .pending
                .lock()
                .entry(key.to_string())
                .or_default()
                .clone();

            let mut batch = slot.lock();
            if batch.closed {
                // Finalize took this batch after we looked it up
                continue;
            }
            let Some(item) = item.take() else {
                return;
            };
            batch.items.push((seq, item));
            if let Some(previous) = batch.timer.take() {
                previous.cancel();
            }
            let timer = CancellationToken::new();
            batch.timer = Some(timer.clone());
            trace!(group = %key, seq, items = batch.items.len(), "album item buffered");
            drop(batch);

            self.spawn_timer(key.to_string(), slot, timer);
            return;
        }
    }

    fn spawn_timer(&self, key: String, slot: BatchSlot, timer: CancellationToken) {
        let inner = self.inner.clone();
        let quiet_period = inner.settings.quiet_period;

        tokio::spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => {
                    trace!(group = %key, "album timer superseded");
                    return;
                }
                _ = tokio::time::sleep(quiet_period) => {}
            }

            // Past this point the finalize runs to completion
            let Some(items) = inner.take_batch(&key, &slot) else {
                trace!(group = %key, "album already taken");
                return;
            };
            if let Err(e) = inner
                .finalize(items, ShareOrigin::Album { group_key: key.clone() })
                .await
            {
                warn!(group = %key, error = %e, "failed to finalize album");
            }
        });
    }
}

impl Inner {
    /// Remove the batch for `key` if `slot` is still the live one
    fn take_batch(&self, key: &str, slot: &BatchSlot) -> Option<Vec<ArrivedItem>> {
        let mut pending = self.pending.lock();
        if !pending.get(key).is_some_and(|live| Arc::ptr_eq(live, slot)) {
            return None;
        }
        pending.remove(key);

        let mut batch = slot.lock();
        batch.closed = true;
        batch.timer = None;
        let items = sorted_items(std::mem::take(&mut batch.items));
        (!items.is_empty()).then_some(items)
    }

    async fn finalize(
        &self,
        items: Vec<ArrivedItem>,
        origin: ShareOrigin,
    ) -> Result<Option<Share>, DepotError> {
        let Some(first) = items.first() else {
            return Ok(None);
        };
        let anchor = first.id;

        if let Some(existing) = self.registry.find_by_item(anchor).await? {
            info!(item = anchor, code = %existing.code, "item already shared, skipping");
            emit(
                &self.event_tx,
                DepotEvent::DuplicateSkipped {
                    item_id: anchor,
                    existing_code: existing.code,
                },
            );
            return Ok(None);
        }

        let group_text = items
            .iter()
            .find_map(|item| item.text.as_deref().filter(|t| !t.is_empty()))
            .unwrap_or_default()
            .to_string();
        let keywords = derive_keywords(&group_text);
        let prefix = if items.len() > 1 { ALBUM_TITLE } else { FILE_TITLE };

        let share = self
            .registry
            .create(NewShare {
                owner_id: self.settings.channel_id,
                item_ids: items.iter().map(|item| item.id).collect(),
                title: ShareTitle::Generated(prefix),
                protect_content: false,
                group_text,
                keywords,
            })
            .await?;

        self.publish(&share, anchor).await;
        debug!(code = %share.code, keywords = ?share.keywords, "channel share published");
        emit(
            &self.event_tx,
            DepotEvent::ShareCreated {
                share: share.clone(),
                origin,
            },
        );
        Ok(Some(share))
    }

    /// Put the share link next to the content: a button on the first item,
    /// or a reply announcing it when editing is off or refused
    async fn publish(&self, share: &Share, anchor: ItemId) {
        let channel = self.settings.channel_id;
        let link = self.links.share_url(&share.code);

        if !self.settings.disable_channel_button {
            let buttons = [LinkButton::new("Share link", self.links.forward_url(&link))];
            match self.transport.edit_controls(channel, anchor, &buttons).await {
                Ok(()) => return,
                Err(e) => {
                    warn!(item = anchor, error = %e, "failed to attach share link, announcing instead")
                }
            }
        }

        let text = format!("Share link: {}\nCode: {}", link, share.code);
        let buttons = [LinkButton::new("Open link", link.clone())];
        if let Err(e) = self
            .transport
            .send_content(channel, &text, Some(anchor), &buttons)
            .await
        {
            warn!(code = %share.code, error = %e, "failed to announce share link");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::start_memory_db;
    use crate::share::CodeGenerator;
    use crate::testing::{MockTransport, TransportCall};

    const CHANNEL: ChatId = -1001000000001;
    const QUIET: Duration = Duration::from_secs(2);

    struct Harness {
        aggregator: BurstAggregator,
        registry: ShareRegistry,
        transport: Arc<MockTransport>,
        events: mpsc::Receiver<DepotEvent>,
    }

    fn harness_with(disable_channel_button: bool) -> Harness {
        let db = Arc::new(tokio::sync::Mutex::new(start_memory_db().unwrap()));
        let registry = ShareRegistry::new(db, CodeGenerator::default(), 16);
        let transport = Arc::new(MockTransport::new());
        let (tx, events) = mpsc::channel(16);
        let aggregator = BurstAggregator::new(
            registry.clone(),
            transport.clone(),
            ShareLinks::new("depot_bot"),
            tx,
            AggregatorSettings {
                channel_id: CHANNEL,
                quiet_period: QUIET,
                disable_channel_button,
            },
        );
        Harness {
            aggregator,
            registry,
            transport,
            events,
        }
    }

    fn harness() -> Harness {
        harness_with(false)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_becomes_one_share_in_arrival_order() {
        let h = harness();
        let arrivals = [
            ArrivedItem::new(30),
            ArrivedItem::with_text(10, "sunset"),
            ArrivedItem::with_text(20, "ignored"),
        ];
        for item in arrivals {
            assert!(h.aggregator.on_item_arrived(Some("g1"), item).await.unwrap().is_none());
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        assert_eq!(h.aggregator.pending_groups(), 1);
        assert_eq!(h.registry.count().await.unwrap(), 0);

        tokio::time::sleep(QUIET).await;

        assert_eq!(h.aggregator.pending_groups(), 0);
        assert_eq!(h.registry.count().await.unwrap(), 1);
        let share = h.registry.find_by_item(30).await.unwrap().unwrap();
        assert_eq!(share.item_ids, vec![30, 10, 20]);
        assert_eq!(share.group_text, "sunset");
        assert_eq!(share.keywords.len(), 4);
        assert_eq!(share.title, format!("Album-{}", share.code));
        assert_eq!(share.owner_id, CHANNEL);

        // Exactly one publish: a button on the first item
        let edits = h.transport.edits();
        assert_eq!(edits.len(), 1);
        match &edits[0] {
            TransportCall::Edit { item, buttons, .. } => {
                assert_eq!(*item, 30);
                assert!(buttons[0].url.contains(&share.code));
            }
            other => panic!("unexpected call {:?}", other),
        }
        assert!(h.transport.sends().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_arrivals_spaced_beyond_quiet_period_make_two_shares() {
        let h = harness();
        h.aggregator.on_item_arrived(Some("g1"), ArrivedItem::new(1)).await.unwrap();
        tokio::time::sleep(QUIET + Duration::from_millis(500)).await;
        h.aggregator.on_item_arrived(Some("g1"), ArrivedItem::new(2)).await.unwrap();
        tokio::time::sleep(QUIET + Duration::from_millis(500)).await;

        assert_eq!(h.registry.count().await.unwrap(), 2);
        let first = h.registry.find_by_item(1).await.unwrap().unwrap();
        let second = h.registry.find_by_item(2).await.unwrap().unwrap();
        assert_ne!(first.code, second.code);
        assert_eq!(first.item_ids, vec![1]);
        assert_eq!(second.item_ids, vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_groups_are_independent() {
        let h = harness();
        h.aggregator.on_item_arrived(Some("a"), ArrivedItem::new(1)).await.unwrap();
        h.aggregator.on_item_arrived(Some("b"), ArrivedItem::new(2)).await.unwrap();
        h.aggregator.on_item_arrived(Some("a"), ArrivedItem::new(3)).await.unwrap();
        tokio::time::sleep(QUIET * 2).await;

        assert_eq!(h.registry.count().await.unwrap(), 2);
        assert_eq!(h.registry.find_by_item(1).await.unwrap().unwrap().item_ids, vec![1, 3]);
        assert_eq!(h.registry.find_by_item(2).await.unwrap().unwrap().item_ids, vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_edit_falls_back_to_announcement() {
        let mut h = harness();
        h.transport.set_reject_edits(true);

        let share = h
            .aggregator
            .on_item_arrived(None, ArrivedItem::with_text(42, "cat"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(share.title, format!("File-{}", share.code));

        let sends = h.transport.sends();
        assert_eq!(sends.len(), 1);
        match &sends[0] {
            TransportCall::Send {
                chat,
                text,
                reply_to,
                buttons,
            } => {
                assert_eq!(*chat, CHANNEL);
                assert_eq!(*reply_to, Some(42));
                assert!(text.contains(&share.code));
                assert_eq!(buttons[0].url, format!("https://t.me/depot_bot?start={}", share.code));
            }
            other => panic!("unexpected call {:?}", other),
        }

        match h.events.try_recv().unwrap() {
            DepotEvent::ShareCreated { share: created, origin } => {
                assert_eq!(created.code, share.code);
                assert_eq!(origin, ShareOrigin::Single);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_disabled_button_announces_without_editing() {
        let h = harness_with(true);
        h.aggregator.on_item_arrived(None, ArrivedItem::new(5)).await.unwrap();
        assert!(h.transport.edits().is_empty());
        assert_eq!(h.transport.sends().len(), 1);
    }

    #[tokio::test]
    async fn test_already_shared_item_is_skipped() {
        let mut h = harness();
        let existing = h
            .registry
            .create(NewShare {
                owner_id: CHANNEL,
                item_ids: vec![7, 8],
                title: ShareTitle::Generated(ALBUM_TITLE),
                protect_content: false,
                group_text: String::new(),
                keywords: Vec::new(),
            })
            .await
            .unwrap();

        let result = h.aggregator.on_item_arrived(None, ArrivedItem::new(7)).await.unwrap();
        assert!(result.is_none());
        assert_eq!(h.registry.count().await.unwrap(), 1);
        assert!(h.transport.calls().is_empty());

        match h.events.try_recv().unwrap() {
            DepotEvent::DuplicateSkipped { item_id, existing_code } => {
                assert_eq!(item_id, 7);
                assert_eq!(existing_code, existing.code);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_finalize_after_takeover_is_skipped_as_duplicate() {
        let h = harness();
        // Simulate a batch that lost the race: its items were already shared
        h.aggregator.on_item_arrived(None, ArrivedItem::new(11)).await.unwrap();
        h.aggregator.on_item_arrived(Some("g"), ArrivedItem::new(11)).await.unwrap();
        h.aggregator.on_item_arrived(Some("g"), ArrivedItem::new(12)).await.unwrap();
        tokio::time::sleep(QUIET * 2).await;

        assert_eq!(h.registry.count().await.unwrap(), 1);
        assert!(h.registry.find_by_item(12).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_finalizes_without_waiting() {
        let h = harness();
        h.aggregator.on_item_arrived(Some("g"), ArrivedItem::new(1)).await.unwrap();
        h.aggregator.on_item_arrived(Some("g"), ArrivedItem::new(2)).await.unwrap();

        assert_eq!(h.aggregator.flush().await, 1);
        assert_eq!(h.aggregator.pending_groups(), 0);
        assert_eq!(h.registry.count().await.unwrap(), 1);

        // The cancelled timer must not produce a second share
        tokio::time::sleep(QUIET * 2).await;
        assert_eq!(h.registry.count().await.unwrap(), 1);
        assert_eq!(h.registry.find_by_item(2).await.unwrap().unwrap().item_ids, vec![1, 2]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_arrivals_share_one_batch() {
        let db = Arc::new(tokio::sync::Mutex::new(start_memory_db().unwrap()));
        let registry = ShareRegistry::new(db, CodeGenerator::default(), 16);
        let (tx, _events) = mpsc::channel(16);
        let aggregator = BurstAggregator::new(
            registry.clone(),
            Arc::new(MockTransport::new()),
            ShareLinks::new("depot_bot"),
            tx,
            AggregatorSettings {
                channel_id: CHANNEL,
                quiet_period: Duration::from_millis(300),
                disable_channel_button: false,
            },
        );

        let mut handles = Vec::new();
        for id in 1..=20 {
            let aggregator = aggregator.clone();
            handles.push(tokio::spawn(async move {
                aggregator.on_item_arrived(Some("burst"), ArrivedItem::new(id)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        tokio::time::sleep(Duration::from_millis(1200)).await;

        assert_eq!(registry.count().await.unwrap(), 1);
        let share = registry.find_by_item(1).await.unwrap().unwrap();
        let mut items = share.item_ids.clone();
        items.sort();
        assert_eq!(items, (1..=20).collect::<Vec<_>>());
    }
}
