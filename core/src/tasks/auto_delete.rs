//! Delayed deletion of delivered items
//!
//! Once scheduled a deletion always runs; there is no cancel. Each delete
//! is attempted independently and an item that is already gone counts as
//! deleted.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::transport::{ChatId, ItemId, Transport, TransportError};

/// Outcome of one scheduled deletion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub deleted: usize,
    pub failed: usize,
}

/// Schedules best-effort deletions through the transport
#[derive(Clone)]
pub struct AutoDeleteScheduler {
    transport: Arc<dyn Transport>,
}

impl AutoDeleteScheduler {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Delete `items`, then `notice`, from `chat` after `delay`
    ///
    /// Dropping the returned handle does not stop the task.
    pub fn schedule(
        &self,
        chat: ChatId,
        items: Vec<ItemId>,
        notice: Option<ItemId>,
        delay: Duration,
    ) -> JoinHandle<DeleteReport> {
        let transport = self.transport.clone();
        debug!(chat, items = items.len(), delay_secs = delay.as_secs(), "auto-delete scheduled");

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            run_deletion(transport.as_ref(), chat, &items, notice).await
        })
    }
}

async fn run_deletion(
    transport: &dyn Transport,
    chat: ChatId,
    items: &[ItemId],
    notice: Option<ItemId>,
) -> DeleteReport {
    let mut report = DeleteReport::default();

    for &item in items.iter().chain(notice.iter()) {
        match transport.delete_content(chat, item).await {
            Ok(()) | Err(TransportError::Missing) => report.deleted += 1,
            Err(e) => {
                warn!(chat, item, error = %e, "auto-delete failed");
                report.failed += 1;
            }
        }
    }

    debug!(chat, deleted = report.deleted, failed = report.failed, "auto-delete finished");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;

    #[tokio::test(start_paused = true)]
    async fn test_deletes_items_then_notice_after_delay() {
        let transport = Arc::new(MockTransport::new());
        let scheduler = AutoDeleteScheduler::new(transport.clone());

        let handle = scheduler.schedule(9, vec![1, 2, 3], Some(4), Duration::from_secs(600));

        tokio::time::sleep(Duration::from_secs(599)).await;
        assert!(transport.deleted_items().is_empty());

        let report = handle.await.unwrap();
        assert_eq!(report, DeleteReport { deleted: 4, failed: 0 });
        assert_eq!(transport.deleted_items(), vec![1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_failure_does_not_stop_the_rest() {
        let transport = Arc::new(MockTransport::new());
        transport.fail_delete(2);
        let scheduler = AutoDeleteScheduler::new(transport.clone());

        let report = scheduler
            .schedule(9, vec![1, 2, 3], Some(4), Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(report, DeleteReport { deleted: 3, failed: 1 });
        assert_eq!(transport.deleted_items(), vec![1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_deleted_counts_as_deleted() {
        let transport = Arc::new(MockTransport::new());
        transport.mark_missing(1);
        let scheduler = AutoDeleteScheduler::new(transport.clone());

        let report = scheduler
            .schedule(9, vec![1], None, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(report, DeleteReport { deleted: 1, failed: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_still_runs() {
        let transport = Arc::new(MockTransport::new());
        let scheduler = AutoDeleteScheduler::new(transport.clone());

        drop(scheduler.schedule(9, vec![5], None, Duration::from_secs(5)));
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(transport.deleted_items(), vec![5]);
    }
}
