//! Schema migrations.
//!
//! Applied migrations are tracked in a `_migrations` table. Table creation
//! uses `IF NOT EXISTS` and column additions are skipped when the column is
//! already there, so a complaints table created outside this crate upgrades
//! in place.

use rusqlite::Connection;

use super::error::DatabaseError;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
    kind: MigrationKind,
}

enum MigrationKind {
    /// Execute the SQL directly.
    Standard,
    /// ALTER TABLE ADD COLUMN, skipped if the column already exists.
    AddColumn {
        table: &'static str,
        column: &'static str,
    },
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_complaints_table",
        sql: include_str!("sql/001_create_complaints.sql"),
        kind: MigrationKind::Standard,
    },
    Migration {
        version: 2,
        description: "add_first_seen_to_complaints",
        sql: include_str!("sql/002_add_first_seen.sql"),
        kind: MigrationKind::AddColumn {
            table: "complaints",
            column: "first_seen_utc",
        },
    },
    Migration {
        version: 3,
        description: "add_initiator_to_complaints",
        sql: include_str!("sql/003_add_initiator.sql"),
        kind: MigrationKind::AddColumn {
            table: "complaints",
            column: "initiator_email",
        },
    },
    Migration {
        version: 4,
        description: "create_custom_columns_table",
        sql: include_str!("sql/004_create_custom_columns.sql"),
        kind: MigrationKind::Standard,
    },
    Migration {
        version: 5,
        description: "create_sync_state_table",
        sql: include_str!("sql/005_create_sync_state.sql"),
        kind: MigrationKind::Standard,
    },
    Migration {
        version: 6,
        description: "index_complaints_case_key",
        sql: include_str!("sql/006_index_case_key.sql"),
        kind: MigrationKind::Standard,
    },
    Migration {
        version: 7,
        description: "create_skipped_conversations_table",
        sql: include_str!("sql/007_create_skipped_conversations.sql"),
        kind: MigrationKind::Standard,
    },
];

/// Runs all pending migrations on the given connection.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current_version: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        log::info!(
            "Running migration v{}: {}",
            migration.version,
            migration.description
        );

        let should_run = match &migration.kind {
            MigrationKind::Standard => true,
            MigrationKind::AddColumn { table, column } => !column_exists(conn, table, column)?,
        };

        if should_run {
            conn.execute_batch(migration.sql)
                .map_err(|e| DatabaseError::Migration {
                    version: migration.version,
                    description: migration.description,
                    reason: e.to_string(),
                })?;
        } else {
            log::info!(
                "Skipping migration v{} (column already present)",
                migration.version
            );
        }

        conn.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.description],
        )?;
    }

    Ok(())
}

/// Checks whether a column exists on a table using `PRAGMA table_info`.
pub(crate) fn column_exists(
    conn: &Connection,
    table: &str,
    column: &str,
) -> Result<bool, DatabaseError> {
    if !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(DatabaseError::InvalidColumn(table.to_string()));
    }
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let exists = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .any(|r| r.map(|name| name.eq_ignore_ascii_case(column)).unwrap_or(false));
    Ok(exists)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migration_count(conn: &Connection) -> u32 {
        conn.query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_migrations_run_on_fresh_db() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();
        assert_eq!(migration_count(&conn), MIGRATIONS.len() as u32);
        assert!(column_exists(&conn, "complaints", "first_seen_utc").unwrap());
        assert!(column_exists(&conn, "complaints", "initiator_email").unwrap());
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();
        run_all(&conn).unwrap();
        assert_eq!(migration_count(&conn), MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_upgrades_legacy_schema() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE complaints (
                conversation_id TEXT PRIMARY KEY, received_utc TEXT, from_email TEXT,
                subject TEXT, jo_number TEXT, part_number TEXT, category TEXT, summary TEXT,
                case_key TEXT, thread_url TEXT, first_seen_utc TEXT, initiator_email TEXT
            );
            INSERT INTO complaints (conversation_id, received_utc, case_key)
                VALUES ('legacy', '2024-05-01T12:00:00Z', 'acmecom-x');",
        )
        .unwrap();

        run_all(&conn).unwrap();

        let kept: String = conn
            .query_row("SELECT case_key FROM complaints WHERE conversation_id = 'legacy'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(kept, "acmecom-x");
        assert_eq!(migration_count(&conn), MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_column_exists_check() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE test_tbl (id TEXT, name TEXT);")
            .unwrap();

        assert!(column_exists(&conn, "test_tbl", "id").unwrap());
        assert!(!column_exists(&conn, "test_tbl", "missing").unwrap());
        assert!(column_exists(&conn, "test_tbl; DROP", "id").is_err());
    }
}
