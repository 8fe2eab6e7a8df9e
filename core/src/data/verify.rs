//! Verification status persistence
//!
//! One row per principal holding the outstanding challenge token and the
//! time of the last successful confirmation. Staleness is judged by the
//! caller; nothing here expires rows on its own.

use rusqlite::{params, Connection, OptionalExtension};

/// Persisted verification state of a principal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationStatus {
    /// Current outstanding challenge, empty if none
    pub token: String,
    pub verified: bool,
    /// Unix seconds of the last successful confirmation (0 if never)
    pub verified_at: i64,
}

/// Load a principal's status. Unknown principals get the default (unverified).
pub fn get_verify_status(conn: &Connection, principal_id: i64) -> rusqlite::Result<VerificationStatus> {
    let status = conn
        .query_row(
            "SELECT verify_token, is_verified, verified_at FROM verify_status WHERE principal_id = ?1",
            [principal_id],
            |row| {
                let verified_raw: i64 = row.get(1)?;
                Ok(VerificationStatus {
                    token: row.get(0)?,
                    verified: verified_raw != 0,
                    verified_at: row.get(2)?,
                })
            },
        )
        .optional()?;

    Ok(status.unwrap_or_default())
}

/// Store a fresh challenge token and mark the principal unverified
pub fn store_verify_token(conn: &Connection, principal_id: i64, token: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO verify_status (principal_id, verify_token, is_verified, verified_at)
         VALUES (?1, ?2, 0, 0)
         ON CONFLICT(principal_id) DO UPDATE SET
             verify_token = excluded.verify_token,
             is_verified = 0",
        params![principal_id, token],
    )?;
    Ok(())
}

/// Mark verified if (and only if) `token` matches the stored one
///
/// Single statement, so the compare and the write are atomic. A matching
/// token is consumed, and an empty token never matches. Returns true if
/// the principal was verified.
pub fn confirm_verify_token(
    conn: &Connection,
    principal_id: i64,
    token: &str,
    now: i64,
) -> rusqlite::Result<bool> {
    if token.is_empty() {
        return Ok(false);
    }
    let rows = conn.execute(
        "UPDATE verify_status SET is_verified = 1, verified_at = ?3, verify_token = ''
         WHERE principal_id = ?1 AND verify_token = ?2 AND verify_token != ''",
        params![principal_id, token, now],
    )?;
    Ok(rows > 0)
}

/// Reset the verified flag and drop any outstanding token (after the
/// caller observed staleness)
pub fn reset_verified(conn: &Connection, principal_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE verify_status SET is_verified = 0, verify_token = '' WHERE principal_id = ?1",
        [principal_id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::start_memory_db;

    #[test]
    fn test_unknown_principal_is_unverified() {
        let conn = start_memory_db().unwrap();
        let status = get_verify_status(&conn, 1).unwrap();
        assert_eq!(status, VerificationStatus::default());
    }

    #[test]
    fn test_token_roundtrip() {
        let conn = start_memory_db().unwrap();
        store_verify_token(&conn, 1, "abcDEF1234").unwrap();

        assert!(!confirm_verify_token(&conn, 1, "wrong", 10).unwrap());
        assert!(!get_verify_status(&conn, 1).unwrap().verified);

        assert!(confirm_verify_token(&conn, 1, "abcDEF1234", 10).unwrap());
        let status = get_verify_status(&conn, 1).unwrap();
        assert!(status.verified);
        assert_eq!(status.verified_at, 10);
        assert!(status.token.is_empty());
    }

    #[test]
    fn test_token_is_single_use() {
        let conn = start_memory_db().unwrap();
        store_verify_token(&conn, 1, "once000000").unwrap();
        assert!(confirm_verify_token(&conn, 1, "once000000", 10).unwrap());

        reset_verified(&conn, 1).unwrap();
        assert!(!confirm_verify_token(&conn, 1, "once000000", 20).unwrap());
        let status = get_verify_status(&conn, 1).unwrap();
        assert!(!status.verified);
        assert_eq!(status.verified_at, 10);
    }

    #[test]
    fn test_empty_token_never_confirms() {
        let conn = start_memory_db().unwrap();
        store_verify_token(&conn, 2, "").unwrap();
        assert!(!confirm_verify_token(&conn, 2, "", 10).unwrap());
        // Unknown principal
        assert!(!confirm_verify_token(&conn, 3, "token", 10).unwrap());
    }

    #[test]
    fn test_reissue_clears_verified() {
        let conn = start_memory_db().unwrap();
        store_verify_token(&conn, 1, "first00000").unwrap();
        confirm_verify_token(&conn, 1, "first00000", 10).unwrap();

        store_verify_token(&conn, 1, "second0000").unwrap();
        let status = get_verify_status(&conn, 1).unwrap();
        assert!(!status.verified);
        assert_eq!(status.token, "second0000");
        // Old token no longer works
        assert!(!confirm_verify_token(&conn, 1, "first00000", 20).unwrap());
    }

    #[test]
    fn test_reset_verified() {
        let conn = start_memory_db().unwrap();
        store_verify_token(&conn, 1, "tok").unwrap();
        confirm_verify_token(&conn, 1, "tok", 10).unwrap();
        reset_verified(&conn, 1).unwrap();
        assert!(!get_verify_status(&conn, 1).unwrap().verified);

        // An unanswered challenge is dropped too
        store_verify_token(&conn, 1, "tok2").unwrap();
        reset_verified(&conn, 1).unwrap();
        assert!(get_verify_status(&conn, 1).unwrap().token.is_empty());
    }
}
