//! Depot lifecycle: start, stop, shared state

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;
use rusqlite::Connection;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{info, warn};

use crate::data::{self, start_db, start_memory_db};
use crate::resilience::{RateLimitConfig, RateLimiter, VerificationGate};
use crate::share::{
    CodeGenerator, LinkCodec, LinkShortener, ShareLinks, ShareRegistry, ShareSessions,
};
use crate::tasks::{AggregatorSettings, AutoDeleteScheduler, BurstAggregator};
use crate::transport::{ChatId, Transport};

use super::config::DepotConfig;
use super::error::DepotError;
use super::events::DepotEvent;

/// Default database file when the config names none
const DEFAULT_DB_PATH: &str = "depot.db";

/// The Depot service
///
/// Owns every per-process component and wires them to one database and
/// one transport. Cheap to share behind an `Arc`.
pub struct Depot {
    pub(crate) config: DepotConfig,
    /// Database connection (wrapped for thread safety)
    pub(crate) db: Arc<Mutex<Connection>>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) registry: ShareRegistry,
    pub(crate) sessions: ShareSessions,
    pub(crate) aggregator: BurstAggregator,
    pub(crate) rate_limiter: Arc<RateLimiter>,
    pub(crate) gate: VerificationGate,
    pub(crate) auto_delete: AutoDeleteScheduler,
    pub(crate) codec: LinkCodec,
    pub(crate) links: ShareLinks,
    /// Wraps verification links when set
    pub(crate) shortener: Option<Arc<dyn LinkShortener>>,
    /// Invite links of force-subscribe channels, fetched on first use
    pub(crate) invite_links: SyncMutex<HashMap<ChatId, String>>,
    /// Event sender
    pub(crate) event_tx: mpsc::Sender<DepotEvent>,
    /// Event receiver, handed out once
    event_rx: Arc<RwLock<Option<mpsc::Receiver<DepotEvent>>>>,
    /// Running flag
    pub(crate) running: Arc<RwLock<bool>>,
    /// Background tasks
    pub(crate) tasks: Arc<RwLock<Vec<tokio::task::JoinHandle<()>>>>,
}

impl Depot {
    /// Start Depot on the configured database file
    pub async fn start(config: DepotConfig, transport: Arc<dyn Transport>) -> Result<Self, DepotError> {
        config.validate()?;

        let db_path = config
            .db_path
            .clone()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let conn = start_db(&db_path)?;
        info!(path = %db_path, "database opened");

        Self::start_with_connection(config, conn, transport).await
    }

    /// Start Depot on a fresh in-memory database
    pub async fn start_in_memory(
        config: DepotConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, DepotError> {
        config.validate()?;
        let conn = start_memory_db()?;
        Self::start_with_connection(config, conn, transport).await
    }

    async fn start_with_connection(
        config: DepotConfig,
        conn: Connection,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, DepotError> {
        let codec = LinkCodec::new(config.channel_id)
            .ok_or_else(|| DepotError::InvalidInput("channel_id cannot be 0".to_string()))?;
        let links = ShareLinks::new(config.bot_username.clone());
        let db = Arc::new(Mutex::new(conn));

        let registry = ShareRegistry::new(
            db.clone(),
            CodeGenerator::new(config.share_code_length),
            config.max_code_attempts,
        );
        let (event_tx, event_rx) = mpsc::channel(config.event_buffer);

        let aggregator = BurstAggregator::new(
            registry.clone(),
            transport.clone(),
            links.clone(),
            event_tx.clone(),
            AggregatorSettings {
                channel_id: config.channel_id,
                quiet_period: config.album_quiet_period(),
                disable_channel_button: config.disable_channel_button,
            },
        );
        let rate_limiter = Arc::new(RateLimiter::with_config(RateLimitConfig {
            max_requests: config.rate_limit_max,
            window_duration: config.rate_limit_window(),
            enabled: true,
        }));

        let depot = Self {
            sessions: ShareSessions::new(registry.clone()),
            gate: VerificationGate::new(db.clone(), config.verify_token_length),
            auto_delete: AutoDeleteScheduler::new(transport.clone()),
            config,
            db,
            transport,
            registry,
            aggregator,
            rate_limiter,
            codec,
            links,
            shortener: None,
            invite_links: SyncMutex::new(HashMap::new()),
            event_tx,
            event_rx: Arc::new(RwLock::new(Some(event_rx))),
            running: Arc::new(RwLock::new(true)),
            tasks: Arc::new(RwLock::new(Vec::new())),
        };

        depot.start_background_tasks().await;

        info!(
            channel = depot.config.channel_id,
            bot = %depot.config.bot_username,
            verify = depot.config.verify_enabled,
            force_sub = depot.config.force_sub_channels.len(),
            "Depot started"
        );
        Ok(depot)
    }

    /// Shorten verification links through `shortener`
    pub fn with_shortener(mut self, shortener: Arc<dyn LinkShortener>) -> Self {
        self.shortener = Some(shortener);
        self
    }

    /// Stop Depot
    ///
    /// Albums still in their quiet period are finalized first.
    pub async fn stop(&self) {
        info!("Stopping Depot...");

        {
            let mut running = self.running.write().await;
            if !*running {
                return;
            }
            *running = false;
        }

        let flushed = self.aggregator.flush().await;
        if flushed > 0 {
            info!(albums = flushed, "pending albums finalized on shutdown");
        }

        {
            let mut tasks = self.tasks.write().await;
            for task in tasks.drain(..) {
                task.abort();
            }
        }

        info!("Depot stopped");
    }

    /// Get the event receiver
    ///
    /// Can only be called once - subsequent calls return None.
    pub async fn events(&self) -> Option<mpsc::Receiver<DepotEvent>> {
        let mut rx = self.event_rx.write().await;
        rx.take()
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    pub(crate) async fn check_running(&self) -> Result<(), DepotError> {
        if !*self.running.read().await {
            return Err(DepotError::NotRunning);
        }
        Ok(())
    }

    pub fn config(&self) -> &DepotConfig {
        &self.config
    }

    /// Direct access to the share registry
    pub fn registry(&self) -> &ShareRegistry {
        &self.registry
    }

    pub fn links(&self) -> &ShareLinks {
        &self.links
    }

    /// Usage counters
    pub async fn stats(&self) -> Result<HashMap<String, i64>, DepotError> {
        let db = self.db.lock().await;
        Ok(data::get_all_stats(&db)?)
    }

    /// Add to a usage counter; failures are only logged
    pub(crate) async fn bump_stat(&self, key: &str, value: usize) {
        let value = i64::try_from(value).unwrap_or(i64::MAX);
        let db = self.db.lock().await;
        if let Err(e) = data::increment_stat(&db, key, value) {
            warn!(stat = key, error = %e, "failed to update usage counter");
        }
    }
}
