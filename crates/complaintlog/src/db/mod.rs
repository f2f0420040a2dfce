//! SQLite persistence: the `complaints` table, user-declared custom
//! columns, skipped-conversation markers, and key/value sync state. Repositories are free functions over
//! [`Database`].

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, Transaction};

pub mod case_repo;
pub mod custom_column_repo;
pub mod error;
pub mod migrations;
pub mod skip_repo;
pub mod sync_state_repo;

pub use case_repo::ComplaintRow;
pub use error::DatabaseError;

/// Pragmas applied to every file-backed connection. WAL lets the dashboard
/// read while a sync run writes; the busy timeout covers its short writes.
const FILE_PRAGMAS: &str = "PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;";

/// Shared handle to the complaint database. Clones share one connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens or creates the database file, creating its directory, and
    /// brings the schema up to date.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(FILE_PRAGMAS)?;
        let db = Self::migrated(conn)?;
        log::info!(
            "Complaint database ready at {} (schema v{})",
            path.display(),
            db.schema_version()?
        );
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::migrated(Connection::open_in_memory()?)
    }

    fn migrated(conn: Connection) -> Result<Self, DatabaseError> {
        migrations::run_all(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }

    /// Runs `f` in one transaction; commits on `Ok`, rolls back on `Err`.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, DatabaseError>,
    {
        let mut conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Highest applied migration version.
    pub fn schema_version(&self) -> Result<u32, DatabaseError> {
        self.with_conn(|conn| {
            let version: Option<u32> =
                conn.query_row("SELECT MAX(version) FROM _migrations", [], |r| r.get(0))?;
            Ok(version.unwrap_or(0))
        })
    }
}

/// Returns the canonical database path: `~/.complaintlog/data/complaints.db`.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".complaintlog").join("data").join("complaints.db"))
}
