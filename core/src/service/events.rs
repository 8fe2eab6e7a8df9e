//! Depot events

use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::data::Share;
use crate::transport::ItemId;

/// How a share came to exist
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareOrigin {
    /// A finalized album burst
    Album { group_key: String },
    /// A standalone channel post
    Single,
    /// A completed manual session
    Session,
}

/// Events emitted by Depot
#[derive(Debug, Clone)]
pub enum DepotEvent {
    /// A share was created
    ShareCreated { share: Share, origin: ShareOrigin },
    /// A finalized batch was dropped because its first item is already shared
    DuplicateSkipped { item_id: ItemId, existing_code: String },
}

/// Publish without waiting; a full or closed channel only loses the event
pub(crate) fn emit(tx: &mpsc::Sender<DepotEvent>, event: DepotEvent) {
    match tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(event)) => {
            warn!(?event, "event channel full, dropping event");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            trace!("no event receiver");
        }
    }
}
