//! Banned principals

use rusqlite::{params, Connection, OptionalExtension};

use super::current_timestamp;

/// A banned principal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanEntry {
    pub principal_id: i64,
    pub reason: String,
    pub banned_at: i64,
}

/// Ban a principal (re-banning updates the reason)
pub fn ban_user(conn: &Connection, principal_id: i64, reason: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO banned_users (principal_id, reason, banned_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(principal_id) DO UPDATE SET reason = excluded.reason, banned_at = excluded.banned_at",
        params![principal_id, reason, current_timestamp()],
    )?;
    Ok(())
}

/// Lift a ban - returns true if the principal was banned
pub fn unban_user(conn: &Connection, principal_id: i64) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "DELETE FROM banned_users WHERE principal_id = ?1",
        [principal_id],
    )?;
    Ok(rows > 0)
}

/// Get the ban entry for a principal, if banned
pub fn get_ban(conn: &Connection, principal_id: i64) -> rusqlite::Result<Option<BanEntry>> {
    conn.query_row(
        "SELECT principal_id, reason, banned_at FROM banned_users WHERE principal_id = ?1",
        [principal_id],
        |row| {
            Ok(BanEntry {
                principal_id: row.get(0)?,
                reason: row.get(1)?,
                banned_at: row.get(2)?,
            })
        },
    )
    .optional()
}

/// All bans, most recent first
pub fn list_bans(conn: &Connection) -> rusqlite::Result<Vec<BanEntry>> {
    let mut stmt = conn.prepare(
        "SELECT principal_id, reason, banned_at FROM banned_users ORDER BY banned_at DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(BanEntry {
            principal_id: row.get(0)?,
            reason: row.get(1)?,
            banned_at: row.get(2)?,
        })
    })?;
    rows.collect()
}
