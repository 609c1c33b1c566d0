//! SQLite store
//!
//! Every row the core reads or writes lives here. The [`Database`] wraps one
//! connection behind a mutex and implements the core's store traits:
//!
//! - [`MilestoneStore`](crate::core::transition::MilestoneStore) in [`milestones`]
//! - [`DependencySource`](crate::core::graph::DependencySource) in [`bom`]
//! - [`QualityGateStore`](crate::core::quality_gate::QualityGateStore) in [`gates`]
//!
//! ## Tables
//!
//! - `milestones` - the milestone catalog
//! - `build_records`, `build_steps` - builds and their reported steps
//! - `milestone_history` - append-only transition ledger
//! - `boms`, `build_agents`, `code_exports` - bill of materials
//! - `orbit_dependencies`, `ecm_dependencies` - the two dependency relations
//! - `quality_gates` - versioned gate configurations

pub mod bom;
pub mod builds;
pub mod gates;
pub mod milestones;
pub mod schema;

use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{Connection, ErrorCode};
use tracing::{debug, info};

use crate::error::StoreError;

/// How long a writer waits for another connection's lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite database holding builds, milestones, BOMs and gates
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create the database file, creating parent directories
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        info!("Opening SQLite database at {:?}", path);

        let open_error = |source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path).map_err(open_error)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(open_error)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(open_error)?;

        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: ":memory:".into(),
            source,
        })?;

        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(StoreError::query("enable foreign keys"))?;
        schema::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run a read against the connection
    pub fn with_conn<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
        E: From<StoreError>,
    {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&conn)
    }

    /// Run a write with exclusive access (for transactions)
    pub fn with_conn_mut<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Connection) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&mut conn)
    }
}

/// Whether a statement failed on a UNIQUE, FOREIGN KEY or CHECK constraint
pub(crate) fn is_constraint_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        let enabled: i64 = db
            .with_conn(|conn| {
                conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))
                    .map_err(StoreError::query("read pragma"))
            })
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("radar.db");
        Database::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_reopen_keeps_schema() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("radar.db");
        {
            let db = Database::open(&path).unwrap();
            db.define_milestone("Dev", 0, true).unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.list_milestones().unwrap().len(), 1);
    }
}
