//! Testing utilities for Depot
//!
//! [`MockTransport`] records every transport call and can be told to fail;
//! [`MockShortener`] stands in for a link shortening service;
//! [`memory_depot`] starts a service on an in-memory database wired to a
//! mock transport.
//!
//! # Example
//!
//! ```ignore
//! let (depot, transport) = memory_depot(DepotConfig::for_testing()).await?;
//! depot.on_channel_post(None, ArrivedItem::new(42)).await?;
//! assert_eq!(transport.edits().len(), 1);
//! ```

pub mod shortener;
pub mod transport;

use std::sync::Arc;

pub use shortener::MockShortener;
pub use transport::{MockTransport, TransportCall};

use crate::service::{Depot, DepotConfig, DepotError};

/// Start Depot in memory with a fresh [`MockTransport`]
pub async fn memory_depot(config: DepotConfig) -> Result<(Depot, Arc<MockTransport>), DepotError> {
    let transport = Arc::new(MockTransport::new());
    let depot = Depot::start_in_memory(config, transport.clone()).await?;
    Ok((depot, transport))
}
