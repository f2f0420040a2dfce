//! Markers for conversations that were evaluated but deliberately not
//! written, so later runs over the same mail can pass them by.

use rusqlite::{params, OptionalExtension};

use super::{Database, DatabaseError};

/// Records that `conversation_id` was skipped as of `received_utc`. A marker
/// never moves backwards.
pub fn mark(
    db: &Database,
    conversation_id: &str,
    received_utc: &str,
    reason: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO skipped_conversations (conversation_id, received_utc, reason, updated_at)
             VALUES (?1, ?2, ?3, datetime('now'))
             ON CONFLICT(conversation_id) DO UPDATE SET
               received_utc = ?2, reason = ?3, updated_at = datetime('now')
             WHERE excluded.received_utc > skipped_conversations.received_utc",
            params![conversation_id, received_utc, reason],
        )?;
        Ok(())
    })
}

/// The received time up to which `conversation_id` has been skipped.
pub fn skipped_through(db: &Database, conversation_id: &str) -> Result<Option<String>, DatabaseError> {
    db.with_conn(|conn| {
        let value = conn
            .query_row(
                "SELECT received_utc FROM skipped_conversations WHERE conversation_id = ?1",
                params![conversation_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    })
}
