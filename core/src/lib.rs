//! Depot Core
//!
//! Share-code service for a content relay bot: content posted to a storage
//! channel is grouped into shares with short codes, and users retrieve it
//! by code or by a self-contained link token.
//!
//! This is the foundation crate that provides:
//! - Share registry with collision-safe code minting
//! - Album burst aggregation over quiet-period timers
//! - Link tokens for single items and ranges
//! - Per-user rate limiting, channel membership and verification challenges
//! - Scheduled deletion of delivered copies
//!
//! # Module Structure
//!
//! - `service/`: Public interface (Depot, config, errors, events, retrieval)
//! - `share/`: Codes, link tokens, keywords, registry, manual sessions
//! - `tasks/`: Aggregation, auto-delete, cleanup loop
//! - `resilience/`: Rate limiting and verification
//! - `data/`: SQLite persistence
//! - `transport`: Messaging network interface
//! - `testing/`: Test utilities
//!
//! # Quick Start
//!
//! ```ignore
//! use depot_core::{Depot, DepotConfig, RetrievalOutcome};
//!
//! let depot = Depot::start(DepotConfig::from_env()?, transport).await?;
//!
//! // A post from the storage channel becomes a share
//! let share = depot.on_channel_post(None, ArrivedItem::new(42)).await?;
//!
//! // A user opens the share link
//! match depot.handle_start(user_id, Some(&share.code)).await? {
//!     RetrievalOutcome::Delivered(delivery) => println!("{} items", delivery.sent.len()),
//!     other => println!("{:?}", other),
//! }
//! ```

// Public interface
pub mod service;

// Infrastructure modules (pub for flexibility)
pub mod data;
pub mod resilience;
pub mod share;
pub mod tasks;
pub mod testing;
pub mod transport;

// Re-export main API types for convenience
pub use data::{BanEntry, Share, SharePatch};
pub use share::LinkShortener;
pub use service::{
    ConfigError,
    Delivery,
    Depot,
    DepotConfig,
    DepotError,
    DepotEvent,
    KeywordHit,
    RetrievalOutcome,
    ShareOrigin,
    SharePage,
};
pub use transport::{ChatId, ItemId, LinkButton, Transport, TransportError};
