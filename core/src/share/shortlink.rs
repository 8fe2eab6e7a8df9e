//! Short-link wrapping for verification links
//!
//! Link shortening services are reached by the embedding application;
//! Depot only asks a [`LinkShortener`] for a replacement URL and keeps the
//! plain link when the call fails.

use async_trait::async_trait;

use crate::transport::TransportError;

/// Turns a long URL into a short one
#[async_trait]
pub trait LinkShortener: Send + Sync {
    async fn shorten(&self, url: &str) -> Result<String, TransportError>;
}
