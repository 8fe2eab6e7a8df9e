//! Link shortener double

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::share::LinkShortener;
use crate::transport::TransportError;

/// Hands out `https://short.test/<n>` and remembers every long URL
#[derive(Debug, Default)]
pub struct MockShortener {
    requests: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl MockShortener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with `Unavailable`
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// URLs passed in so far, in order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl LinkShortener for MockShortener {
    async fn shorten(&self, url: &str) -> Result<String, TransportError> {
        let mut requests = self.requests.lock();
        requests.push(url.to_string());
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("shortener down".to_string()));
        }
        Ok(format!("https://short.test/{}", requests.len()))
    }
}
