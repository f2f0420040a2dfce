//! Key/value run state, currently just the mail watermark.

use chrono::{DateTime, Utc};
use rusqlite::params;

use super::{Database, DatabaseError};
use crate::text::{format_utc, parse_stored_utc};

const WATERMARK_KEY: &str = "watermark_utc";

pub fn get(db: &Database, key: &str) -> Result<Option<String>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT value FROM sync_state WHERE key = ?1")?;
        let mut rows = stmt.query_map(params![key], |row| row.get::<_, String>(0))?;
        match rows.next() {
            Some(Ok(val)) => Ok(Some(val)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

pub fn set(db: &Database, key: &str, value: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO sync_state (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    })
}

/// The watermark stored by the last successful run. An unparseable stored
/// value is treated as absent.
pub fn load_watermark(db: &Database) -> Result<Option<DateTime<Utc>>, DatabaseError> {
    let stored = get(db, WATERMARK_KEY)?;
    let parsed = stored.as_deref().and_then(parse_stored_utc);
    if stored.is_some() && parsed.is_none() {
        log::warn!("Ignoring unparseable stored watermark {:?}", stored);
    }
    Ok(parsed)
}

pub fn store_watermark(db: &Database, watermark: DateTime<Utc>) -> Result<(), DatabaseError> {
    set(db, WATERMARK_KEY, &format_utc(&watermark))
}
