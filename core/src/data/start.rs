//! Database initialization and startup
//!
//! Opens the SQLite database and ensures all required tables exist.

use rusqlite::Connection;

use super::schema::create_all_tables;

/// Error type for database startup
#[derive(Debug)]
pub enum StartError {
    /// Empty database path provided
    EmptyPath,
    /// SQLite error
    Database(rusqlite::Error),
}

impl std::fmt::Display for StartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartError::EmptyPath => write!(f, "database path cannot be empty"),
            StartError::Database(e) => write!(f, "database error: {}", e),
        }
    }
}

impl std::error::Error for StartError {}

impl From<rusqlite::Error> for StartError {
    fn from(e: rusqlite::Error) -> Self {
        StartError::Database(e)
    }
}

/// Opens the database file and ensures all required tables exist
///
/// # Errors
/// - `StartError::EmptyPath` if `db_path` is empty
/// - `StartError::Database` for SQLite errors
pub fn start_db(db_path: &str) -> Result<Connection, StartError> {
    if db_path.is_empty() {
        return Err(StartError::EmptyPath);
    }

    let conn = Connection::open(db_path)?;

    // PRAGMA returns the new mode, so query_row instead of execute
    let _: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;

    conn.execute("PRAGMA foreign_keys = ON", [])?;

    // Idempotent (`CREATE TABLE IF NOT EXISTS`)
    create_all_tables(&conn)?;

    Ok(conn)
}

/// Create an in-memory database for testing
pub fn start_memory_db() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    // WAL mode doesn't work with in-memory databases
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    create_all_tables(&conn)?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_empty_path_rejected() {
        let result = start_db("");
        assert!(matches!(result, Err(StartError::EmptyPath)));
    }

    #[test]
    fn test_creates_all_tables_on_new_db() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depot.db");

        let conn = start_db(path.to_str().unwrap()).unwrap();
        let tables = table_names(&conn);

        for expected in [
            "shares",
            "share_items",
            "share_keywords",
            "verify_status",
            "banned_users",
            "stats",
        ] {
            assert!(
                tables.contains(&expected.to_string()),
                "{} table missing",
                expected
            );
        }
    }

    #[test]
    fn test_reopening_db_preserves_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reopen.db");
        let path = path.to_str().unwrap();

        {
            let conn = start_db(path).unwrap();
            conn.execute(
                "INSERT INTO banned_users (principal_id, reason, banned_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![7i64, "spam", 1704067200i64],
            )
            .unwrap();
        }

        {
            let conn = start_db(path).unwrap();
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM banned_users", [], |row| row.get(0))
                .unwrap();
            assert_eq!(count, 1, "data should be preserved, table not recreated");
        }
    }

    #[test]
    fn test_memory_db_has_foreign_keys() {
        let conn = start_memory_db().unwrap();

        let fk_enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk_enabled, 1, "foreign keys should be enabled");
        assert!(table_names(&conn).contains(&"shares".to_string()));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            StartError::EmptyPath.to_string(),
            "database path cannot be empty"
        );
    }
}
