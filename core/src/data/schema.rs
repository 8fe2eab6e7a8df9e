//! Database schema definitions for the Depot store

use rusqlite::Connection;

/// Creates all required database tables
pub fn create_all_tables(conn: &Connection) -> rusqlite::Result<()> {
    create_share_tables(conn)?;
    create_verify_table(conn)?;
    create_ban_table(conn)?;
    create_stats_table(conn)?;
    Ok(())
}

/// Share tables: one row per share plus ordered items and keywords
///
/// `share_items.position` preserves delivery order. Items and keywords
/// cascade with their share.
pub fn create_share_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS shares (
            code TEXT PRIMARY KEY NOT NULL,
            owner_id INTEGER NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            group_text TEXT NOT NULL DEFAULT '',
            protect_content INTEGER NOT NULL DEFAULT 0,
            access_count INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_shares_owner ON shares(owner_id, created_at)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_shares_created ON shares(created_at)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS share_items (
            share_code TEXT NOT NULL,
            position INTEGER NOT NULL,
            item_id INTEGER NOT NULL,
            PRIMARY KEY (share_code, position),
            FOREIGN KEY (share_code) REFERENCES shares(code) ON DELETE CASCADE
        )",
        [],
    )?;

    // Backs find_share_by_item
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_share_items_item ON share_items(item_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS share_keywords (
            share_code TEXT NOT NULL,
            keyword TEXT NOT NULL,
            PRIMARY KEY (share_code, keyword),
            FOREIGN KEY (share_code) REFERENCES shares(code) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_share_keywords_keyword ON share_keywords(keyword)",
        [],
    )?;

    Ok(())
}

/// Verification table: one outstanding challenge per principal
pub fn create_verify_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS verify_status (
            principal_id INTEGER PRIMARY KEY NOT NULL,
            verify_token TEXT NOT NULL DEFAULT '',
            is_verified INTEGER NOT NULL DEFAULT 0,
            verified_at INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;
    Ok(())
}

/// Ban table: principals refused at the retrieval gate
pub fn create_ban_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS banned_users (
            principal_id INTEGER PRIMARY KEY NOT NULL,
            reason TEXT NOT NULL DEFAULT '',
            banned_at INTEGER NOT NULL
        )",
        [],
    )?;
    Ok(())
}

/// Usage counters keyed by name
pub fn create_stats_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS stats (
            key TEXT PRIMARY KEY NOT NULL,
            count INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;
    Ok(())
}
