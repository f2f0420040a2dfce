//! User-declared report columns, stored as extra nullable TEXT columns on
//! `complaints` and tracked in `custom_columns`.

use rusqlite::params;

use super::migrations::column_exists;
use super::{Database, DatabaseError};

const MAX_COLUMN_NAME_LEN: usize = 64;

const BASE_COLUMNS: &[&str] = &[
    "conversation_id",
    "received_utc",
    "from_email",
    "subject",
    "jo_number",
    "part_number",
    "category",
    "summary",
    "case_key",
    "thread_url",
    "first_seen_utc",
    "initiator_email",
];

/// Accepts ASCII letters, digits and underscores, not starting with a digit,
/// and not shadowing a built-in column.
pub fn validate_column_name(name: &str) -> Result<(), DatabaseError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_COLUMN_NAME_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && !BASE_COLUMNS.iter().any(|b| b.eq_ignore_ascii_case(name));
    if valid {
        Ok(())
    } else {
        Err(DatabaseError::InvalidColumn(name.to_string()))
    }
}

/// Tracks a custom column and adds it to `complaints` if missing.
/// Returns `false` if it was already tracked.
pub fn add(db: &Database, name: &str) -> Result<bool, DatabaseError> {
    validate_column_name(name)?;
    let inserted = db.with_transaction(|tx| {
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO custom_columns (column_name) VALUES (?1)",
            params![name],
        )?;
        if !column_exists(tx, "complaints", name)? {
            tx.execute_batch(&format!("ALTER TABLE complaints ADD COLUMN \"{}\" TEXT", name))?;
        }
        Ok(inserted > 0)
    })?;
    if inserted {
        log::info!("Added custom column {}", name);
    }
    Ok(inserted)
}

/// Stops tracking a custom column. The column itself stays in the table,
/// so re-adding it restores earlier values.
pub fn remove(db: &Database, name: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let count = conn.execute(
            "DELETE FROM custom_columns WHERE column_name = ?1",
            params![name],
        )?;
        Ok(count > 0)
    })
}

/// Tracked custom columns in declaration order.
pub fn list(db: &Database) -> Result<Vec<String>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT column_name FROM custom_columns ORDER BY rowid")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    })
}
