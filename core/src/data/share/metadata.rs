//! Share record database operations
//!
//! A share maps a short code to an ordered list of content items in the
//! storage channel. Items and keywords live in child tables so both
//! `find_share_by_item` and `find_shares_by_keyword` are index lookups.

use rusqlite::{params, Connection, OptionalExtension};

use crate::data::current_timestamp;
use crate::transport::ItemId;

/// A persisted share
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Share {
    /// Unique, immutable share code
    pub code: String,
    /// Creator (operator id or source channel id)
    pub owner_id: i64,
    /// Items in delivery order
    pub item_ids: Vec<ItemId>,
    pub title: String,
    /// Free text taken from the batch (caption of the first captioned item)
    pub group_text: String,
    /// Discovery keywords (at most 4)
    pub keywords: Vec<String>,
    /// Forbid re-forwarding by recipients
    pub protect_content: bool,
    pub access_count: u64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Partial update for a share. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharePatch {
    pub title: Option<String>,
    pub group_text: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub protect_content: Option<bool>,
}

impl SharePatch {
    /// True if the patch would change nothing
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.group_text.is_none()
            && self.keywords.is_none()
            && self.protect_content.is_none()
    }
}

const SHARE_COLUMNS: &str =
    "code, owner_id, title, group_text, protect_content, access_count, created_at, updated_at";

fn parse_u64_from_i64(value: i64, column_index: usize) -> rusqlite::Result<u64> {
    u64::try_from(value).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(column_index, value))
}

fn parse_share_row(row: &rusqlite::Row) -> rusqlite::Result<Share> {
    let protect_raw: i64 = row.get(4)?;
    let access_raw: i64 = row.get(5)?;

    Ok(Share {
        code: row.get(0)?,
        owner_id: row.get(1)?,
        item_ids: Vec::new(),
        title: row.get(2)?,
        group_text: row.get(3)?,
        keywords: Vec::new(),
        protect_content: protect_raw != 0,
        access_count: parse_u64_from_i64(access_raw, 5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

/// Fill in the child rows (items, keywords) of a share header
fn load_children(conn: &Connection, mut share: Share) -> rusqlite::Result<Share> {
    let mut stmt = conn.prepare_cached(
        "SELECT item_id FROM share_items WHERE share_code = ?1 ORDER BY position",
    )?;
    share.item_ids = stmt
        .query_map([&share.code], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<ItemId>>>()?;

    let mut stmt = conn.prepare_cached(
        "SELECT keyword FROM share_keywords WHERE share_code = ?1 ORDER BY rowid",
    )?;
    share.keywords = stmt
        .query_map([&share.code], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;

    Ok(share)
}

fn load_all(conn: &Connection, headers: Vec<Share>) -> rusqlite::Result<Vec<Share>> {
    headers
        .into_iter()
        .map(|share| load_children(conn, share))
        .collect()
}

fn insert_keywords(conn: &Connection, code: &str, keywords: &[String]) -> rusqlite::Result<()> {
    for keyword in keywords {
        conn.execute(
            "INSERT OR IGNORE INTO share_keywords (share_code, keyword) VALUES (?1, ?2)",
            params![code, keyword],
        )?;
    }
    Ok(())
}

/// Check whether a code is already taken
pub fn share_exists(conn: &Connection, code: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM shares WHERE code = ?1",
        [code],
        |row| row.get(0),
    )
}

/// Insert a new share with its items and keywords
///
/// Fails with a constraint violation if the code already exists.
pub fn insert_share(conn: &Connection, share: &Share) -> rusqlite::Result<()> {
    let access_count = i64::try_from(share.access_count).map_err(|_| {
        rusqlite::Error::InvalidParameterName("access_count exceeds sqlite INTEGER range".to_string())
    })?;

    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "INSERT INTO shares
         (code, owner_id, title, group_text, protect_content, access_count, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            share.code,
            share.owner_id,
            share.title,
            share.group_text,
            share.protect_content as i64,
            access_count,
            share.created_at,
            share.updated_at,
        ],
    )?;

    for (position, item_id) in share.item_ids.iter().enumerate() {
        tx.execute(
            "INSERT INTO share_items (share_code, position, item_id) VALUES (?1, ?2, ?3)",
            params![share.code, position as i64, item_id],
        )?;
    }

    insert_keywords(&tx, &share.code, &share.keywords)?;

    tx.commit()
}

/// Get a share by code
pub fn get_share(conn: &Connection, code: &str) -> rusqlite::Result<Option<Share>> {
    let header = conn
        .query_row(
            &format!("SELECT {} FROM shares WHERE code = ?1", SHARE_COLUMNS),
            [code],
            parse_share_row,
        )
        .optional()?;

    header.map(|share| load_children(conn, share)).transpose()
}

/// Find the share (if any) that already contains an item
pub fn find_share_by_item(conn: &Connection, item_id: ItemId) -> rusqlite::Result<Option<Share>> {
    let code: Option<String> = conn
        .query_row(
            "SELECT share_code FROM share_items WHERE item_id = ?1 ORDER BY rowid LIMIT 1",
            [item_id],
            |row| row.get(0),
        )
        .optional()?;

    match code {
        Some(code) => get_share(conn, &code),
        None => Ok(None),
    }
}

/// Shares tagged with a keyword, most recent first
pub fn find_shares_by_keyword(
    conn: &Connection,
    keyword: &str,
    limit: usize,
) -> rusqlite::Result<Vec<Share>> {
    let mut stmt = conn.prepare_cached(
        "SELECT s.code, s.owner_id, s.title, s.group_text, s.protect_content,
                s.access_count, s.created_at, s.updated_at
         FROM shares s
         JOIN share_keywords k ON k.share_code = s.code
         WHERE k.keyword = ?1
         ORDER BY s.created_at DESC, s.rowid DESC
         LIMIT ?2",
    )?;
    let headers = stmt
        .query_map(params![keyword, limit as i64], parse_share_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    load_all(conn, headers)
}

/// Shares whose title contains `query`, ignoring case (Unicode-aware),
/// most recent first
///
/// SQLite's `LIKE` only folds ASCII, so titles are matched here instead.
pub fn search_shares(conn: &Connection, query: &str, limit: usize) -> rusqlite::Result<Vec<Share>> {
    let needle = query.to_lowercase();
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {} FROM shares ORDER BY created_at DESC, rowid DESC",
        SHARE_COLUMNS
    ))?;

    let mut headers = Vec::new();
    let mut rows = stmt.query([])?;
    while headers.len() < limit {
        let Some(row) = rows.next()? else {
            break;
        };
        let share = parse_share_row(row)?;
        if share.title.to_lowercase().contains(&needle) {
            headers.push(share);
        }
    }
    drop(rows);

    load_all(conn, headers)
}

/// Increment the access counter. Returns false if the share is gone.
pub fn increment_share_access(conn: &Connection, code: &str) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE shares SET access_count = access_count + 1 WHERE code = ?1",
        [code],
    )?;
    Ok(changed > 0)
}

/// Apply a partial update. Returns false if the share does not exist.
pub fn update_share(conn: &Connection, code: &str, patch: &SharePatch) -> rusqlite::Result<bool> {
    let tx = conn.unchecked_transaction()?;

    let changed = tx.execute(
        "UPDATE shares SET
            title = COALESCE(?2, title),
            group_text = COALESCE(?3, group_text),
            protect_content = COALESCE(?4, protect_content),
            updated_at = ?5
         WHERE code = ?1",
        params![
            code,
            patch.title,
            patch.group_text,
            patch.protect_content.map(|p| p as i64),
            current_timestamp(),
        ],
    )?;

    if changed == 0 {
        return Ok(false);
    }

    if let Some(keywords) = &patch.keywords {
        tx.execute("DELETE FROM share_keywords WHERE share_code = ?1", [code])?;
        insert_keywords(&tx, code, keywords)?;
    }

    tx.commit()?;
    Ok(true)
}

/// Delete a share (items and keywords cascade). Returns false if absent.
pub fn delete_share(conn: &Connection, code: &str) -> rusqlite::Result<bool> {
    let changed = conn.execute("DELETE FROM shares WHERE code = ?1", [code])?;
    Ok(changed > 0)
}

/// One page of an owner's shares, most recent first, plus the owner's total
///
/// Pages are 1-based; page 0 is treated as page 1.
pub fn list_shares_by_owner(
    conn: &Connection,
    owner_id: i64,
    page: u32,
    per_page: u32,
) -> rusqlite::Result<(Vec<Share>, u64)> {
    let skip = i64::from(page.max(1) - 1) * i64::from(per_page);

    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {} FROM shares WHERE owner_id = ?1
         ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3",
        SHARE_COLUMNS
    ))?;
    let headers = stmt
        .query_map(params![owner_id, i64::from(per_page), skip], parse_share_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let shares = load_all(conn, headers)?;
    let total = count_shares_by_owner(conn, owner_id)?;
    Ok((shares, total))
}

/// Total number of shares
pub fn count_shares(conn: &Connection) -> rusqlite::Result<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM shares", [], |row| row.get(0))?;
    parse_u64_from_i64(count, 0)
}

/// Number of shares owned by `owner_id`
pub fn count_shares_by_owner(conn: &Connection, owner_id: i64) -> rusqlite::Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM shares WHERE owner_id = ?1",
        [owner_id],
        |row| row.get(0),
    )?;
    parse_u64_from_i64(count, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::start_memory_db;

    fn sample(code: &str, items: &[ItemId], created_at: i64) -> Share {
        Share {
            code: code.to_string(),
            owner_id: -100,
            item_ids: items.to_vec(),
            title: format!("Album-{}", code),
            group_text: String::new(),
            keywords: Vec::new(),
            protect_content: false,
            access_count: 0,
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn test_insert_and_get_preserves_item_order() {
        let conn = start_memory_db().unwrap();
        let share = sample("AbCd1234", &[30, 10, 20], 1000);
        insert_share(&conn, &share).unwrap();

        let loaded = get_share(&conn, "AbCd1234").unwrap().unwrap();
        assert_eq!(loaded.item_ids, vec![30, 10, 20]);
        assert_eq!(loaded, share);
    }

    #[test]
    fn test_get_share_nonexistent() {
        let conn = start_memory_db().unwrap();
        assert!(get_share(&conn, "missing1").unwrap().is_none());
        assert!(!share_exists(&conn, "missing1").unwrap());
    }

    #[test]
    fn test_duplicate_code_rejected() {
        let conn = start_memory_db().unwrap();
        insert_share(&conn, &sample("dupcode1", &[1], 1)).unwrap();

        let err = insert_share(&conn, &sample("dupcode1", &[2], 2)).unwrap_err();
        assert!(matches!(err, rusqlite::Error::SqliteFailure(_, _)));
        // Failed insert must not leave orphaned items behind
        assert!(find_share_by_item(&conn, 2).unwrap().is_none());
    }

    #[test]
    fn test_find_share_by_item() {
        let conn = start_memory_db().unwrap();
        insert_share(&conn, &sample("item0001", &[5, 6, 7], 1)).unwrap();

        let found = find_share_by_item(&conn, 6).unwrap().unwrap();
        assert_eq!(found.code, "item0001");
        assert!(find_share_by_item(&conn, 8).unwrap().is_none());
    }

    #[test]
    fn test_find_by_keyword_most_recent_first() {
        let conn = start_memory_db().unwrap();
        let mut older = sample("older001", &[1], 100);
        older.keywords = vec!["c".into(), "a".into()];
        let mut newer = sample("newer001", &[2], 200);
        newer.keywords = vec!["c".into()];
        insert_share(&conn, &older).unwrap();
        insert_share(&conn, &newer).unwrap();

        let found = find_shares_by_keyword(&conn, "c", 6).unwrap();
        let codes: Vec<_> = found.iter().map(|s| s.code.as_str()).collect();
        assert_eq!(codes, vec!["newer001", "older001"]);

        let limited = find_shares_by_keyword(&conn, "c", 1).unwrap();
        assert_eq!(limited.len(), 1);
        assert!(find_shares_by_keyword(&conn, "z", 6).unwrap().is_empty());
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let conn = start_memory_db().unwrap();
        let mut share = sample("search01", &[1], 1);
        share.title = "Holiday Photos".into();
        insert_share(&conn, &share).unwrap();

        assert_eq!(search_shares(&conn, "photo", 10).unwrap().len(), 1);
        assert_eq!(search_shares(&conn, "HOLIDAY", 10).unwrap().len(), 1);
        assert!(search_shares(&conn, "video", 10).unwrap().is_empty());
    }

    #[test]
    fn test_search_folds_non_ascii_case() {
        let conn = start_memory_db().unwrap();
        let mut share = sample("search03", &[1], 1);
        share.title = "Ärger im Büro".into();
        insert_share(&conn, &share).unwrap();
        let mut share = sample("search04", &[2], 1);
        share.title = "ΣΟΦΙΑ".into();
        insert_share(&conn, &share).unwrap();

        assert_eq!(search_shares(&conn, "ärger", 10).unwrap()[0].code, "search03");
        assert_eq!(search_shares(&conn, "BÜRO", 10).unwrap().len(), 1);
        assert_eq!(search_shares(&conn, "σοφ", 10).unwrap()[0].code, "search04");
    }

    #[test]
    fn test_search_respects_limit_and_order() {
        let conn = start_memory_db().unwrap();
        for (i, code) in ["limit001", "limit002", "limit003"].iter().enumerate() {
            let mut share = sample(code, &[i as i64 + 1], 1);
            share.title = format!("Report {}", i);
            share.created_at = 100 + i as i64;
            insert_share(&conn, &share).unwrap();
        }

        let found = search_shares(&conn, "report", 2).unwrap();
        let codes: Vec<&str> = found.iter().map(|s| s.code.as_str()).collect();
        assert_eq!(codes, vec!["limit003", "limit002"]);
        assert!(search_shares(&conn, "report", 0).unwrap().is_empty());
    }

    #[test]
    fn test_search_escapes_wildcards() {
        let conn = start_memory_db().unwrap();
        let mut share = sample("search02", &[1], 1);
        share.title = "plain".into();
        insert_share(&conn, &share).unwrap();

        assert!(search_shares(&conn, "%", 10).unwrap().is_empty());
        assert!(search_shares(&conn, "_", 10).unwrap().is_empty());
    }

    #[test]
    fn test_increment_access() {
        let conn = start_memory_db().unwrap();
        insert_share(&conn, &sample("access01", &[1], 1)).unwrap();

        assert!(increment_share_access(&conn, "access01").unwrap());
        assert!(increment_share_access(&conn, "access01").unwrap());
        assert!(!increment_share_access(&conn, "gone0001").unwrap());

        let share = get_share(&conn, "access01").unwrap().unwrap();
        assert_eq!(share.access_count, 2);
    }

    #[test]
    fn test_update_share_partial() {
        let conn = start_memory_db().unwrap();
        let mut share = sample("update01", &[1], 1);
        share.keywords = vec!["x".into()];
        insert_share(&conn, &share).unwrap();

        let patch = SharePatch {
            protect_content: Some(true),
            keywords: Some(vec!["p".into(), "q".into()]),
            ..Default::default()
        };
        assert!(update_share(&conn, "update01", &patch).unwrap());

        let updated = get_share(&conn, "update01").unwrap().unwrap();
        assert!(updated.protect_content);
        assert_eq!(updated.title, share.title);
        assert_eq!(updated.keywords, vec!["p".to_string(), "q".to_string()]);
        assert!(find_shares_by_keyword(&conn, "x", 6).unwrap().is_empty());

        assert!(!update_share(&conn, "missing1", &patch).unwrap());
    }

    #[test]
    fn test_delete_share_cascades() {
        let conn = start_memory_db().unwrap();
        let mut share = sample("delete01", &[9], 1);
        share.keywords = vec!["k".into()];
        insert_share(&conn, &share).unwrap();

        assert!(delete_share(&conn, "delete01").unwrap());
        assert!(get_share(&conn, "delete01").unwrap().is_none());
        assert!(find_share_by_item(&conn, 9).unwrap().is_none());
        assert!(find_shares_by_keyword(&conn, "k", 6).unwrap().is_empty());
        assert!(!delete_share(&conn, "delete01").unwrap());
    }

    #[test]
    fn test_list_by_owner_paginates() {
        let conn = start_memory_db().unwrap();
        for i in 0..7 {
            let mut share = sample(&format!("owner00{}", i), &[i], i);
            share.owner_id = 42;
            insert_share(&conn, &share).unwrap();
        }
        insert_share(&conn, &sample("other001", &[100], 50)).unwrap();

        let (page1, total) = list_shares_by_owner(&conn, 42, 1, 5).unwrap();
        assert_eq!(total, 7);
        assert_eq!(page1.len(), 5);
        assert_eq!(page1[0].code, "owner006");

        let (page2, _) = list_shares_by_owner(&conn, 42, 2, 5).unwrap();
        assert_eq!(page2.len(), 2);
        assert_eq!(page2[1].code, "owner000");

        assert_eq!(count_shares(&conn).unwrap(), 8);
    }
}
