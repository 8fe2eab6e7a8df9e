//! Background work for Depot
//!
//! - Album burst aggregation (per-group quiet-period timers)
//! - Delayed deletion of delivered items
//! - Cleanup loop (prunes idle rate-limit windows)

pub mod aggregator;
pub mod auto_delete;
mod maintenance;

use std::time::Duration;

use tracing::info;

pub use aggregator::{AggregatorSettings, ArrivedItem, BurstAggregator};
pub use auto_delete::{AutoDeleteScheduler, DeleteReport};

use crate::service::Depot;

/// How often idle rate-limit windows are pruned
const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

impl Depot {
    /// Start background tasks
    pub(crate) async fn start_background_tasks(&self) {
        let mut tasks = self.tasks.write().await;

        let rate_limiter = self.rate_limiter.clone();
        let running = self.running.clone();
        let cleanup_task = tokio::spawn(async move {
            maintenance::run_cleanup_loop(rate_limiter, running, RATE_LIMIT_CLEANUP_INTERVAL).await;
        });
        tasks.push(cleanup_task);

        info!(count = tasks.len(), "background tasks started");
    }
}
