//! Depot event handling for CLI

use std::sync::Arc;

use tracing::info;

use depot_core::{Depot, DepotEvent, ShareOrigin};

/// Run the event processing loop
pub async fn run_event_loop(depot: Arc<Depot>) {
    let Some(mut rx) = depot.events().await else {
        return;
    };
    while let Some(event) = rx.recv().await {
        handle_event(event);
    }
}

fn handle_event(event: DepotEvent) {
    match event {
        DepotEvent::ShareCreated { share, origin } => {
            let origin = match origin {
                ShareOrigin::Album { group_key } => format!("album {}", group_key),
                ShareOrigin::Single => "single post".to_string(),
                ShareOrigin::Session => "session".to_string(),
            };
            info!(
                code = %share.code,
                items = share.item_ids.len(),
                keywords = ?share.keywords,
                origin = %origin,
                "Share created"
            );
        }
        DepotEvent::DuplicateSkipped { item_id, existing_code } => {
            info!(item = item_id, code = %existing_code, "Duplicate skipped");
        }
    }
}
