//! Data layer for the Depot store
//!
//! Provides storage and retrieval for:
//! - Share records with ordered items and discovery keywords
//! - Per-principal verification status
//! - Banned principals
//! - Usage counters
//!
//! Every function takes a plain `&Connection`; callers own the locking
//! (the service keeps the connection behind `Arc<Mutex<Connection>>`).

pub mod bans;
pub mod schema;
pub mod share;
pub mod start;
pub mod stats;
pub mod verify;

use std::time::{SystemTime, UNIX_EPOCH};

pub use bans::{ban_user, get_ban, list_bans, unban_user, BanEntry};
pub use schema::create_all_tables;
pub use share::{
    count_shares, count_shares_by_owner, delete_share, find_share_by_item,
    find_shares_by_keyword, get_share, increment_share_access, insert_share,
    list_shares_by_owner, search_shares, share_exists, update_share, Share, SharePatch,
};
pub use start::{start_db, start_memory_db, StartError};
pub use stats::{
    get_all_stats, get_stat, increment_stat, STAT_FILES_SHARED, STAT_LINKS_GENERATED,
    STAT_SHARE_ACCESSED, STAT_TOKENS_VERIFIED,
};
pub use verify::{
    confirm_verify_token, get_verify_status, reset_verified, store_verify_token,
    VerificationStatus,
};

/// Current unix time in seconds
pub fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
