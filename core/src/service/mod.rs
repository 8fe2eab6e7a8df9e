//! Depot service facade
//!
//! - `core`: [`Depot`] struct, start/stop, shared state
//! - `retrieval`: start requests and delivery
//! - `admin`: channel intake, discovery, ownership checks, bans, sessions
//! - `config`, `error`, `events`: supporting types

pub mod admin;
pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod retrieval;

pub use admin::{KeywordHit, SharePage};
pub use config::DepotConfig;
pub use core::Depot;
pub use error::{ConfigError, DepotError};
pub use events::{DepotEvent, ShareOrigin};
pub use retrieval::{format_duration, Delivery, RetrievalOutcome};
