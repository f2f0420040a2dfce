//! Complaint repository: CRUD operations for the `complaints` table.
//!
//! Columns are nullable because databases created by the earlier tooling
//! contain NULLs; [`ComplaintRow`] maps NULL text to an empty string except
//! for the two timestamp columns.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::custom_column_repo;
use super::{Database, DatabaseError};

/// A raw complaint row. Timestamps are stored as `YYYY-MM-DDTHH:MM:SS.fffffffffZ`
/// text; older rows may lack the fraction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ComplaintRow {
    pub conversation_id: String,
    pub received_utc: String,
    pub from_email: String,
    pub subject: String,
    pub part_number: String,
    pub category: String,
    pub summary: String,
    pub case_key: String,
    pub thread_url: String,
    pub first_seen_utc: Option<String>,
    pub initiator_email: Option<String>,
}

const SELECT_COLUMNS: &str = "conversation_id, received_utc, from_email, subject, part_number, \
     category, summary, case_key, thread_url, first_seen_utc, initiator_email";

impl ComplaintRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let text = |name: &str| -> Result<String, rusqlite::Error> {
            Ok(row.get::<_, Option<String>>(name)?.unwrap_or_default())
        };
        Ok(Self {
            conversation_id: row.get("conversation_id")?,
            received_utc: text("received_utc")?,
            from_email: text("from_email")?,
            subject: text("subject")?,
            part_number: text("part_number")?,
            category: text("category")?,
            summary: text("summary")?,
            case_key: text("case_key")?,
            thread_url: text("thread_url")?,
            first_seen_utc: row.get("first_seen_utc")?,
            initiator_email: row.get("initiator_email")?,
        })
    }
}

fn find_in(conn: &Connection, conversation_id: &str) -> Result<Option<ComplaintRow>, DatabaseError> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {} FROM complaints WHERE conversation_id = ?1",
                SELECT_COLUMNS
            ),
            params![conversation_id],
            ComplaintRow::from_row,
        )
        .optional()?;
    Ok(row)
}

fn write_in(conn: &Connection, row: &ComplaintRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO complaints (conversation_id, received_utc, from_email, subject, part_number,
                                 category, summary, case_key, thread_url, first_seen_utc, initiator_email)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(conversation_id) DO UPDATE SET
           received_utc = ?2,
           from_email = ?3,
           subject = ?4,
           part_number = ?5,
           category = ?6,
           summary = ?7,
           case_key = ?8,
           thread_url = ?9,
           first_seen_utc = ?10,
           initiator_email = ?11",
        params![
            row.conversation_id,
            row.received_utc,
            row.from_email,
            row.subject,
            row.part_number,
            row.category,
            row.summary,
            row.case_key,
            row.thread_url,
            row.first_seen_utc,
            row.initiator_email,
        ],
    )?;
    Ok(())
}

/// Finds a complaint by conversation id.
pub fn find_by_conversation(
    db: &Database,
    conversation_id: &str,
) -> Result<Option<ComplaintRow>, DatabaseError> {
    db.with_conn(|conn| find_in(conn, conversation_id))
}

/// Finds the most recently received complaint carrying `case_key`.
pub fn find_latest_by_case_key(
    db: &Database,
    case_key: &str,
) -> Result<Option<ComplaintRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM complaints WHERE case_key = ?1
             ORDER BY received_utc DESC LIMIT 1",
            SELECT_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![case_key], ComplaintRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Read-modify-write of one conversation's row inside a single transaction.
///
/// `f` receives the current row (if any) and returns the row to write, or
/// `None` to leave the table untouched. Returns whether a row was written.
pub fn modify<F>(db: &Database, conversation_id: &str, f: F) -> Result<bool, DatabaseError>
where
    F: FnOnce(Option<ComplaintRow>) -> Option<ComplaintRow>,
{
    db.with_transaction(|tx| {
        let current = find_in(tx, conversation_id)?;
        match f(current) {
            Some(mut row) => {
                row.conversation_id = conversation_id.to_string();
                write_in(tx, &row)?;
                Ok(true)
            }
            None => Ok(false),
        }
    })
}

/// Advances only `received_utc`. Returns whether a row was touched.
pub fn touch(db: &Database, conversation_id: &str, received_utc: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let count = conn.execute(
            "UPDATE complaints SET received_utc = ?2 WHERE conversation_id = ?1",
            params![conversation_id, received_utc],
        )?;
        Ok(count > 0)
    })
}

/// All complaint rows, oldest received first.
pub fn list_all(db: &Database) -> Result<Vec<ComplaintRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM complaints ORDER BY received_utc ASC, conversation_id ASC",
            SELECT_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], ComplaintRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Values of the given custom columns, keyed by conversation id, in the
/// order the columns were requested.
pub fn custom_values(
    db: &Database,
    columns: &[String],
) -> Result<Vec<(String, Vec<Option<String>>)>, DatabaseError> {
    if columns.is_empty() {
        return Ok(Vec::new());
    }
    for column in columns {
        custom_column_repo::validate_column_name(column)?;
    }
    db.with_conn(|conn| {
        let selected: Vec<String> = columns.iter().map(|c| format!("\"{}\"", c)).collect();
        let sql = format!(
            "SELECT conversation_id, {} FROM complaints",
            selected.join(", ")
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let values = (1..=columns.len())
                    .map(|i| row.get::<_, Option<String>>(i))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((id, values))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Writes a user value into a tracked custom column.
pub fn set_custom_value(
    db: &Database,
    conversation_id: &str,
    column: &str,
    value: Option<&str>,
) -> Result<bool, DatabaseError> {
    custom_column_repo::validate_column_name(column)?;
    if !custom_column_repo::list(db)?.iter().any(|c| c == column) {
        return Err(DatabaseError::UnknownColumn(column.to_string()));
    }
    db.with_conn(|conn| {
        let count = conn.execute(
            &format!(
                "UPDATE complaints SET \"{}\" = ?2 WHERE conversation_id = ?1",
                column
            ),
            params![conversation_id, value],
        )?;
        Ok(count > 0)
    })
}

/// Explicit manual deletion. Returns whether a row was removed.
pub fn delete(db: &Database, conversation_id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let count = conn.execute(
            "DELETE FROM complaints WHERE conversation_id = ?1",
            params![conversation_id],
        )?;
        Ok(count > 0)
    })
}

/// Counts stored complaints.
pub fn count(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM complaints", [], |r| r.get(0))?;
        Ok(count)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn sample(id: &str, received: &str, key: &str) -> ComplaintRow {
        ComplaintRow {
            conversation_id: id.to_string(),
            received_utc: received.to_string(),
            from_email: "bob@acme.com".to_string(),
            subject: "Cracked housing".to_string(),
            part_number: "12345-AB".to_string(),
            category: "Product".to_string(),
            summary: "Housing cracked on arrival.".to_string(),
            case_key: key.to_string(),
            thread_url: "https://outlook.office.com/x".to_string(),
            first_seen_utc: Some(received.to_string()),
            initiator_email: Some("bob@acme.com".to_string()),
        }
    }

    fn put(db: &Database, row: ComplaintRow) {
        let id = row.conversation_id.clone();
        assert!(modify(db, &id, |_| Some(row)).unwrap());
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        put(&db, sample("c1", "2025-03-03T15:00:00Z", "k1"));
        let found = find_by_conversation(&db, "c1").unwrap().unwrap();
        assert_eq!(found, sample("c1", "2025-03-03T15:00:00Z", "k1"));
        assert!(find_by_conversation(&db, "nope").unwrap().is_none());
    }

    #[test]
    fn test_modify_sees_current_row() {
        let db = test_db();
        put(&db, sample("c1", "2025-03-03T15:00:00Z", "k1"));
        let written = modify(&db, "c1", |current| {
            let mut row = current.unwrap();
            row.summary = "changed".to_string();
            Some(row)
        })
        .unwrap();
        assert!(written);
        assert_eq!(find_by_conversation(&db, "c1").unwrap().unwrap().summary, "changed");
        assert!(!modify(&db, "c2", |_| None).unwrap());
        assert_eq!(count(&db).unwrap(), 1);
    }

    #[test]
    fn test_latest_by_case_key() {
        let db = test_db();
        put(&db, sample("c1", "2025-03-03T15:00:00Z", "k1"));
        put(&db, sample("c2", "2025-03-05T09:00:00Z", "k1"));
        put(&db, sample("c3", "2025-03-09T09:00:00Z", "k2"));
        let latest = find_latest_by_case_key(&db, "k1").unwrap().unwrap();
        assert_eq!(latest.conversation_id, "c2");
        assert!(find_latest_by_case_key(&db, "k9").unwrap().is_none());
    }

    #[test]
    fn test_touch_only_changes_received() {
        let db = test_db();
        put(&db, sample("c1", "2025-03-03T15:00:00Z", "k1"));
        assert!(touch(&db, "c1", "2025-03-04T08:00:00Z").unwrap());
        assert!(!touch(&db, "missing", "2025-03-04T08:00:00Z").unwrap());
        let row = find_by_conversation(&db, "c1").unwrap().unwrap();
        assert_eq!(row.received_utc, "2025-03-04T08:00:00Z");
        assert_eq!(row.first_seen_utc.as_deref(), Some("2025-03-03T15:00:00Z"));
        assert_eq!(row.summary, "Housing cracked on arrival.");
    }

    #[test]
    fn test_null_columns_read_as_empty() {
        let db = test_db();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO complaints (conversation_id, received_utc) VALUES ('legacy', '2024-01-01T00:00:00Z')",
                [],
            )?;
            Ok(())
        })
        .unwrap();
        let row = find_by_conversation(&db, "legacy").unwrap().unwrap();
        assert_eq!(row.subject, "");
        assert!(row.first_seen_utc.is_none());
        assert!(row.initiator_email.is_none());
    }

    #[test]
    fn test_delete() {
        let db = test_db();
        put(&db, sample("c1", "2025-03-03T15:00:00Z", "k1"));
        assert!(delete(&db, "c1").unwrap());
        assert!(!delete(&db, "c1").unwrap());
        assert!(list_all(&db).unwrap().is_empty());
    }

    #[test]
    fn test_custom_values() {
        let db = test_db();
        put(&db, sample("c1", "2025-03-03T15:00:00Z", "k1"));
        custom_column_repo::add(&db, "Owner").unwrap();
        assert!(set_custom_value(&db, "c1", "Owner", Some("Dana")).unwrap());
        let values = custom_values(&db, &["Owner".to_string()]).unwrap();
        assert_eq!(values, vec![("c1".to_string(), vec![Some("Dana".to_string())])]);
        assert!(matches!(
            set_custom_value(&db, "c1", "Untracked", Some("x")),
            Err(DatabaseError::UnknownColumn(_))
        ));
    }
}
