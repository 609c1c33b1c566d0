//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

use radar::core::build::{BuildRecordId, NewBuildRecord};
use radar::infra::db::Database;

/// Test store context
///
/// Holds a temporary directory with a database file and an isolated
/// config directory, so tests never touch the user's real store.
pub struct TestStore {
    /// Temporary directory for the database and config
    pub dir: TempDir,
}

impl TestStore {
    /// Create a new store location in a temporary directory
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Path to the database file
    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("radar.db")
    }

    /// Isolated config directory
    pub fn config_dir(&self) -> PathBuf {
        self.dir.path().join("config")
    }

    /// Open the database
    pub fn open(&self) -> Database {
        Database::open(&self.db_path()).expect("Failed to open database")
    }

    /// Open the database with the default milestones seeded
    pub fn seeded(&self) -> Database {
        let db = self.open();
        db.seed_default_milestones().expect("Failed to seed milestones");
        db
    }

    /// Write a config.toml into the isolated config directory
    pub fn write_config(&self, content: &str) {
        let dir = self.config_dir();
        std::fs::create_dir_all(&dir).expect("Failed to create config directory");
        std::fs::write(dir.join("config.toml"), content).expect("Failed to write config");
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Register a build of component 7 on main at the lowest active milestone
pub fn create_build(db: &Database, build_number: i64) -> BuildRecordId {
    create_component_build(db, 7, build_number, None)
}

/// Register a build with full control over its identity
pub fn create_component_build(
    db: &Database,
    component_id: i64,
    build_number: i64,
    milestone: Option<&str>,
) -> BuildRecordId {
    db.create_build(&NewBuildRecord {
        component_id,
        build_number,
        branch: "main".to_string(),
        milestone: milestone.map(str::to_string),
    })
    .expect("Failed to create build")
    .id
}

/// Run radar against the test store
pub fn run_radar(store: &TestStore, args: &[&str]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_radar"));
    cmd.current_dir(store.path())
        .env("RADAR_DB", store.db_path())
        .env("RADAR_CONFIG_DIR", store.config_dir())
        .env("RADAR_DATA_DIR", store.path().join("data"))
        .env_remove("RUST_LOG")
        .env_remove("RADAR_ACTOR");
    for arg in args {
        cmd.arg(arg);
    }
    cmd.output().expect("Failed to execute radar")
}

/// Stdout as a string
pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Stderr as a string
pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
