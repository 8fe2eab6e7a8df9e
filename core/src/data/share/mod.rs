//! Share data layer
//!
//! Persistence for share records, their ordered items and keywords.

pub mod metadata;

pub use metadata::{
    count_shares, count_shares_by_owner, delete_share, find_share_by_item,
    find_shares_by_keyword, get_share, increment_share_access, insert_share,
    list_shares_by_owner, search_shares, share_exists, update_share, Share, SharePatch,
};
