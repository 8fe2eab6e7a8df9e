//! Rate limiting for retrievals
//!
//! Sliding window per principal. Each window sits behind its own lock so
//! unrelated principals never contend; the outer map lock is only held to
//! find or create a window.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Configuration for rate limiting
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per window for a single principal.
    /// Set to 0 to deny everything.
    pub max_requests: usize,
    /// Window duration
    pub window_duration: Duration,
    /// Whether rate limiting is enabled
    pub enabled: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window_duration: Duration::from_secs(60),
            enabled: true,
        }
    }
}

/// Result of a rate limit check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request is allowed
    Allowed,
    /// Request is rate limited
    Limited {
        /// Time until the oldest request leaves the window
        retry_after: Duration,
    },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed)
    }
}

/// Request timestamps of one principal
#[derive(Debug)]
struct SlidingWindow {
    /// Timestamps of requests in the current window, oldest first
    requests: VecDeque<Instant>,
}

impl SlidingWindow {
    fn new() -> Self {
        Self {
            requests: VecDeque::new(),
        }
    }

    fn prune(&mut self, now: Instant, window: Duration) {
        let Some(cutoff) = now.checked_sub(window) else {
            return;
        };
        while self.requests.front().is_some_and(|&t| t <= cutoff) {
            self.requests.pop_front();
        }
    }

    /// Check if a request is allowed and record it if so
    ///
    /// A refused request is not recorded, so hammering does not extend the block.
    fn check_and_record(&mut self, now: Instant, max_requests: usize, window: Duration) -> RateLimitResult {
        self.prune(now, window);

        if self.requests.len() >= max_requests {
            return RateLimitResult::Limited {
                retry_after: self.retry_after(now, window),
            };
        }

        self.requests.push_back(now);
        RateLimitResult::Allowed
    }

    /// Time until the oldest live entry exits the window
    fn retry_after(&self, now: Instant, window: Duration) -> Duration {
        let cutoff = now.checked_sub(window);
        self.requests
            .iter()
            .find(|&&t| cutoff.map_or(true, |c| t > c))
            .map(|&oldest| window.saturating_sub(now.saturating_duration_since(oldest)))
            .unwrap_or(Duration::ZERO)
    }

    fn is_stale(&self, now: Instant, stale_after: Duration) -> bool {
        !self
            .requests
            .iter()
            .any(|&t| now.saturating_duration_since(t) < stale_after)
    }
}

/// Per-principal sliding-window rate limiter
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<i64, Arc<Mutex<SlidingWindow>>>>,
    /// Number of rate-limit checks since construction.
    check_counter: AtomicU64,
}

impl RateLimiter {
    /// Run opportunistic cleanup after this many checks.
    const AUTO_CLEANUP_CHECK_INTERVAL: u64 = 64;

    /// Create a new rate limiter with default config
    pub fn new() -> Self {
        Self::with_config(RateLimitConfig::default())
    }

    /// Create a new rate limiter with custom config
    pub fn with_config(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
            check_counter: AtomicU64::new(0),
        }
    }

    fn window(&self, principal: i64) -> Arc<Mutex<SlidingWindow>> {
        self.windows
            .lock()
            .entry(principal)
            .or_insert_with(|| Arc::new(Mutex::new(SlidingWindow::new())))
            .clone()
    }

    fn maybe_cleanup(&self, now: Instant) {
        let count = self.check_counter.fetch_add(1, Ordering::Relaxed) + 1;
        if count % Self::AUTO_CLEANUP_CHECK_INTERVAL == 0 {
            self.cleanup_with_now(now);
        }
    }

    /// Record a request from `principal` if the window has room
    pub fn check_and_record(&self, principal: i64) -> bool {
        self.check_and_record_at(principal, Instant::now()).is_allowed()
    }

    /// [`check_and_record`](Self::check_and_record) against an explicit clock reading
    pub fn check_and_record_at(&self, principal: i64, now: Instant) -> RateLimitResult {
        if !self.config.enabled {
            return RateLimitResult::Allowed;
        }

        let result = self.window(principal).lock().check_and_record(
            now,
            self.config.max_requests,
            self.config.window_duration,
        );
        self.maybe_cleanup(now);
        result
    }

    /// Whole seconds until `principal` can be served again (0 if now)
    ///
    /// Rounded up, so waiting this long is always enough.
    pub fn wait_seconds(&self, principal: i64) -> u64 {
        let wait = self.wait_at(principal, Instant::now());
        wait.as_secs() + u64::from(wait.subsec_nanos() > 0)
    }

    /// Time until the oldest retained request of `principal` exits the window
    pub fn wait_at(&self, principal: i64, now: Instant) -> Duration {
        let window = self.windows.lock().get(&principal).cloned();
        match window {
            Some(window) => window.lock().retry_after(now, self.config.window_duration),
            None => Duration::ZERO,
        }
    }

    /// Clean up old entries to prevent memory bloat
    pub fn cleanup(&self) {
        self.cleanup_with_now(Instant::now());
    }

    fn cleanup_with_now(&self, now: Instant) {
        let stale_after = self.config.window_duration.saturating_mul(2);
        // A window someone else holds a handle to is in use; leave it
        self.windows.lock().retain(|_, window| {
            Arc::strong_count(window) > 1 || !window.lock().is_stale(now, stale_after)
        });
    }

    /// Get current stats
    pub fn stats(&self) -> RateLimitStats {
        RateLimitStats {
            tracked_principals: self.windows.lock().len(),
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about the rate limiter
#[derive(Debug, Clone)]
pub struct RateLimitStats {
    pub tracked_principals: usize,
}
