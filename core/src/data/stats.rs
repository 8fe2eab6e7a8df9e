//! Usage counters

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension};

/// Shares created (any path)
pub const STAT_LINKS_GENERATED: &str = "links_generated";
/// Successful share-code lookups
pub const STAT_SHARE_ACCESSED: &str = "share_accessed";
/// Items delivered to recipients
pub const STAT_FILES_SHARED: &str = "files_shared";
/// Successful verification confirmations
pub const STAT_TOKENS_VERIFIED: &str = "tokens_verified";

/// Add `value` to a counter, creating it if needed
pub fn increment_stat(conn: &Connection, key: &str, value: i64) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO stats (key, count) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET count = count + excluded.count",
        params![key, value],
    )?;
    Ok(())
}

/// Current value of a counter (0 if never incremented)
pub fn get_stat(conn: &Connection, key: &str) -> rusqlite::Result<i64> {
    let count = conn
        .query_row("SELECT count FROM stats WHERE key = ?1", [key], |row| row.get(0))
        .optional()?;
    Ok(count.unwrap_or(0))
}

/// All counters
pub fn get_all_stats(conn: &Connection) -> rusqlite::Result<HashMap<String, i64>> {
    let mut stmt = conn.prepare("SELECT key, count FROM stats")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}
