//! Database schema definitions

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::error::StoreError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Create or migrate the schema
pub fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!("Migrating schema from v{} to v{}", current_version, SCHEMA_VERSION);
        migrate_schema(conn, current_version)?;
    }

    Ok(())
}

/// Current schema version (0 if not initialized)
fn get_schema_version(conn: &Connection) -> Result<i32, StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )
    .map_err(StoreError::query("create schema_version"))?;

    let version = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .optional()
        .map_err(StoreError::query("read schema_version"))?;

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), StoreError> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(StoreError::query("clear schema_version"))?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])
        .map_err(StoreError::query("set schema_version"))?;
    Ok(())
}

fn create_tables(conn: &Connection) -> Result<(), StoreError> {
    for batch in [BUILD_SCHEMA, BOM_SCHEMA, GATE_SCHEMA] {
        conn.execute_batch(batch)
            .map_err(|source| StoreError::Schema {
                version: SCHEMA_VERSION,
                source,
            })?;
    }
    Ok(())
}

fn migrate_schema(conn: &Connection, from_version: i32) -> Result<(), StoreError> {
    info!("No migration steps needed from v{}", from_version);
    set_schema_version(conn, SCHEMA_VERSION)
}

/// Milestones, builds and the transition ledger
const BUILD_SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS milestones (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE COLLATE NOCASE,
    level INTEGER NOT NULL,
    active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS build_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    component_id INTEGER NOT NULL,
    build_number INTEGER NOT NULL,
    branch TEXT NOT NULL,
    milestone_id INTEGER NOT NULL REFERENCES milestones(id),
    build_result TEXT,
    build_comment TEXT,
    artifact_url TEXT,
    code_coverage REAL,
    created_at TEXT NOT NULL,
    UNIQUE (component_id, build_number, branch)
);

CREATE TABLE IF NOT EXISTS build_steps (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    build_record_id INTEGER NOT NULL REFERENCES build_records(id),
    step_name TEXT NOT NULL,
    step_result TEXT NOT NULL,
    recorded_at TEXT NOT NULL,
    UNIQUE (build_record_id, step_name)
);

-- Append-only: rows are never updated or deleted
CREATE TABLE IF NOT EXISTS milestone_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    build_record_id INTEGER NOT NULL REFERENCES build_records(id),
    previous_milestone_id INTEGER NOT NULL REFERENCES milestones(id),
    new_milestone_id INTEGER NOT NULL REFERENCES milestones(id),
    actor TEXT NOT NULL,
    comment TEXT,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_build_records_component ON build_records(component_id);
CREATE INDEX IF NOT EXISTS idx_milestone_history_build ON milestone_history(build_record_id);
";

/// Bill of materials and the two dependency relations
const BOM_SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS boms (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    build_record_id INTEGER NOT NULL UNIQUE REFERENCES build_records(id),
    bom_type TEXT NOT NULL,
    build_system TEXT NOT NULL,
    build_system_version TEXT NOT NULL,
    antivirus_dat_version TEXT,
    ecm_mock_master_record_id TEXT,
    locked INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS build_agents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    build_record_id INTEGER NOT NULL REFERENCES boms(build_record_id),
    agent_name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS code_exports (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    build_record_id INTEGER NOT NULL REFERENCES boms(build_record_id),
    bom_type TEXT NOT NULL,
    scm_type TEXT NOT NULL,
    scm_version TEXT NOT NULL,
    scm_protocol TEXT NOT NULL,
    scm_server TEXT NOT NULL,
    scm_path TEXT NOT NULL,
    scm_tag TEXT,
    scm_commit TEXT,
    scm_order INTEGER NOT NULL,
    UNIQUE (build_record_id, scm_order)
);

CREATE TABLE IF NOT EXISTS orbit_dependencies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    build_record_id INTEGER NOT NULL REFERENCES boms(build_record_id),
    bom_type TEXT NOT NULL,
    dependency_build_record_id INTEGER NOT NULL REFERENCES build_records(id),
    scm_order INTEGER NOT NULL,
    UNIQUE (build_record_id, scm_order)
);

CREATE TABLE IF NOT EXISTS ecm_dependencies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    build_record_id INTEGER NOT NULL REFERENCES boms(build_record_id),
    bom_type TEXT NOT NULL,
    ecm_master_id TEXT NOT NULL,
    project_name TEXT NOT NULL,
    version TEXT NOT NULL,
    build_number INTEGER NOT NULL,
    package_number TEXT NOT NULL,
    scm_order INTEGER NOT NULL,
    UNIQUE (build_record_id, scm_order)
);
";

/// Versioned quality gates; AUTOINCREMENT keeps ids from being reused
const GATE_SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS quality_gates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL COLLATE NOCASE,
    description TEXT NOT NULL,
    gate_type TEXT NOT NULL,
    pass INTEGER NOT NULL,
    fail INTEGER NOT NULL,
    min INTEGER NOT NULL,
    max INTEGER NOT NULL,
    active INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_quality_gates_name ON quality_gates(name);
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN
                 ('milestones', 'build_records', 'build_steps', 'milestone_history', 'boms',
                  'build_agents', 'code_exports', 'orbit_dependencies', 'ecm_dependencies',
                  'quality_gates')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 10);
    }
}
