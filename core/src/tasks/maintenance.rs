//! Maintenance tasks
//!
//! Periodic pruning of idle rate-limit windows.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{info, trace};

use crate::resilience::RateLimiter;

/// Run the cleanup loop until `running` turns false
pub(crate) async fn run_cleanup_loop(
    rate_limiter: Arc<RateLimiter>,
    running: Arc<RwLock<bool>>,
    cleanup_interval: Duration,
) {
    info!(
        interval_secs = cleanup_interval.as_secs(),
        "Cleanup loop started"
    );

    loop {
        if !*running.read().await {
            break;
        }

        tokio::time::sleep(cleanup_interval).await;

        // Skip if stopped during sleep
        if !*running.read().await {
            break;
        }

        let before = rate_limiter.stats().tracked_principals;
        rate_limiter.cleanup();
        let after = rate_limiter.stats().tracked_principals;
        trace!(removed = before.saturating_sub(after), tracked = after, "Cleanup: rate-limit windows pruned");
    }

    info!("Cleanup loop stopped");
}
