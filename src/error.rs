//! Error types for radar
//!
//! Domain-specific error types using thiserror.
//!
//! Every domain error can tell whether it is a store fault or a client-side
//! validation failure via `is_store_failure`; the CLI boundary uses that to
//! pick the log severity.

use std::path::PathBuf;
use thiserror::Error;

use crate::core::bom::DependencyKind;

/// Persistence errors raised by the relational store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the database file
    #[error("Failed to open database '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Failed to create the directory holding the database
    #[error("Failed to create database directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A statement failed
    #[error("Database operation '{operation}' failed: {source}")]
    Query {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// Schema creation or migration failed
    #[error("Failed to initialize schema v{version}: {source}")]
    Schema {
        version: i32,
        #[source]
        source: rusqlite::Error,
    },

    /// The connection mutex was poisoned by a panicking writer
    #[error("Database connection lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    /// Wrap a rusqlite error with the name of the operation that failed
    pub fn query(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| Self::Query { operation, source }
    }
}

/// Milestone progression errors
#[derive(Error, Debug)]
pub enum TransitionError {
    /// Target milestone name does not resolve
    #[error("Invalid build milestone '{name}': it does not exist")]
    UnknownMilestone { name: String },

    /// No build record for the given id
    #[error("Could not find build record {build_record_id}")]
    BuildNotFound { build_record_id: i64 },

    /// Target is below the current level or inactive
    #[error("You cannot progress from milestone '{current}' to build milestone '{attempted}'{}",
        if *inactive { " (target milestone is inactive)" } else { "" })]
    IllegalProgression {
        current: String,
        attempted: String,
        inactive: bool,
    },

    /// Another transition moved the build between read and write
    #[error("Build record {build_record_id} changed milestone concurrently; retry the transition")]
    ConcurrentTransition { build_record_id: i64 },

    /// Store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TransitionError {
    /// Whether this is an unexpected persistence fault
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

/// Milestone catalog maintenance errors
#[derive(Error, Debug)]
pub enum MilestoneError {
    /// Name already defined (names compare case-insensitively)
    #[error("A build milestone named '{name}' already exists")]
    Duplicate { name: String },

    /// Name does not resolve
    #[error("Build milestone '{name}' does not exist")]
    NotFound { name: String },

    /// Empty or whitespace-only name
    #[error("Build milestone name cannot be empty")]
    EmptyName,

    /// Store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl MilestoneError {
    /// Whether this is an unexpected persistence fault
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

/// Build record errors
#[derive(Error, Debug)]
pub enum BuildError {
    /// No build record for the given id
    #[error("Can't find a build record for the build record ID passed: '{build_record_id}'")]
    NotFound { build_record_id: i64 },

    /// A record for the same component, number and branch exists
    #[error("A record already exists for build {build_number} of component {component_id} on branch '{branch}'")]
    AlreadyExists {
        component_id: i64,
        build_number: i64,
        branch: String,
    },

    /// Initial milestone name does not resolve
    #[error("Invalid build milestone '{name}': it does not exist")]
    UnknownMilestone { name: String },

    /// No active milestone to start a build at
    #[error("No active build milestones are configured")]
    NoActiveMilestones,

    /// Coverage outside 0..=100
    #[error("Code coverage {value} is out of range (expected 0-100)")]
    CoverageOutOfRange { value: f64 },

    /// Store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BuildError {
    /// Whether this is an unexpected persistence fault
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

/// Bill-of-materials errors
#[derive(Error, Debug)]
pub enum BomError {
    /// Build record the BOM refers to does not exist
    #[error("Can't find a build record for the build record ID passed: '{build_record_id}'")]
    BuildNotFound { build_record_id: i64 },

    /// A BOM may only be submitted once per build
    #[error("A BOM record already exists for build record {build_record_id}")]
    AlreadyExists { build_record_id: i64 },

    /// No BOM for the build
    #[error("A BOM record doesn't exist for build record {build_record_id}")]
    NotFound { build_record_id: i64 },

    /// BOM is locked against further edits
    #[error("The BOM is locked for build record {build_record_id}")]
    Locked { build_record_id: i64 },

    /// Lock requested on an already locked BOM
    #[error("The BOM for build record {build_record_id} is already locked")]
    AlreadyLocked { build_record_id: i64 },

    /// Internal dependency points at a build that does not exist
    #[error("Dependency build record {dependency_build_record_id} does not exist")]
    DependencyTargetNotFound { dependency_build_record_id: i64 },

    /// A build cannot depend on itself
    #[error("Build record {build_record_id} cannot depend on itself")]
    SelfDependency { build_record_id: i64 },

    /// Ordering key already used within the relation
    #[error("{kind} dependency with SCM order {scm_order} already exists for build record {build_record_id}")]
    DuplicateOrderKey {
        build_record_id: i64,
        kind: DependencyKind,
        scm_order: i64,
    },

    /// Code export ordering key already used
    #[error("Code export with SCM order {scm_order} already exists for build record {build_record_id}")]
    DuplicateExportOrder { build_record_id: i64, scm_order: i64 },

    /// Store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BomError {
    /// Whether this is an unexpected persistence fault
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

/// Quality gate errors
#[derive(Error, Debug)]
pub enum QualityGateError {
    /// An active gate with the name exists already
    #[error("An active Quality Gate named '{name}' already exists")]
    DuplicateActiveGate { name: String },

    /// Update of a gate that was never created
    #[error("The Quality Gate '{name}' doesn't exist")]
    NotFound { name: String },

    /// Pass/fail or min/max thresholds are inconsistent
    #[error("Quality Gate '{name}' has invalid thresholds: {message}")]
    InvalidThresholds { name: String, message: String },

    /// Store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl QualityGateError {
    /// Whether this is an unexpected persistence fault
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

/// Change-management notification errors
#[derive(Error, Debug)]
pub enum NotifyError {
    /// Request could not be sent
    #[error("Failed to reach change-management system at '{url}': {error}")]
    Request { url: String, error: String },

    /// Server answered with a non-success status
    #[error("Change-management system at '{url}' answered {status}")]
    Status { url: String, status: u16 },

    /// Notifier client could not be constructed
    #[error("Failed to build notifier client: {error}")]
    Client { error: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file '{path}': {error}")]
    ReadError { path: String, error: String },

    /// Failed to parse config file
    #[error("Failed to parse config file '{path}': {error}")]
    ParseError { path: String, error: String },

    /// Failed to write config file
    #[error("Failed to write config file '{path}': {error}")]
    WriteError { path: String, error: String },
}

/// Top-level radar error type
#[derive(Error, Debug)]
pub enum RadarError {
    /// Milestone transition error
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Milestone catalog error
    #[error(transparent)]
    Milestone(#[from] MilestoneError),

    /// Build record error
    #[error(transparent)]
    Build(#[from] BuildError),

    /// BOM error
    #[error(transparent)]
    Bom(#[from] BomError),

    /// Quality gate error
    #[error(transparent)]
    QualityGate(#[from] QualityGateError),

    /// Store error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Notification error
    #[error(transparent)]
    Notify(#[from] NotifyError),
}

impl RadarError {
    /// Whether this is an unexpected fault rather than client misuse
    ///
    /// Notifier errors never reach the caller of a transition, so when one
    /// surfaces here it came from configuring the client and counts as a fault.
    pub fn is_store_failure(&self) -> bool {
        match self {
            Self::Transition(e) => e.is_store_failure(),
            Self::Milestone(e) => e.is_store_failure(),
            Self::Build(e) => e.is_store_failure(),
            Self::Bom(e) => e.is_store_failure(),
            Self::QualityGate(e) => e.is_store_failure(),
            Self::Store(_) | Self::Notify(_) => true,
            Self::Config(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_illegal_progression_names_both_milestones() {
        let err = TransitionError::IllegalProgression {
            current: "QA".to_string(),
            attempted: "Dev".to_string(),
            inactive: false,
        };
        let message = err.to_string();
        assert!(message.contains("'QA'"));
        assert!(message.contains("'Dev'"));
        assert!(!message.contains("inactive"));
    }

    #[test]
    fn test_illegal_progression_mentions_inactive_target() {
        let err = TransitionError::IllegalProgression {
            current: "QA".to_string(),
            attempted: "Legacy".to_string(),
            inactive: true,
        };
        assert!(err.to_string().contains("inactive"));
    }

    #[test]
    fn test_store_failure_classification() {
        let store = StoreError::LockPoisoned;
        assert!(RadarError::from(TransitionError::from(store)).is_store_failure());

        let client = TransitionError::UnknownMilestone {
            name: "Nope".to_string(),
        };
        assert!(!RadarError::from(client).is_store_failure());

        let gate = QualityGateError::DuplicateActiveGate {
            name: "CodeCov".to_string(),
        };
        assert!(!RadarError::from(gate).is_store_failure());
    }

    #[test]
    fn test_duplicate_order_key_names_kind() {
        let err = BomError::DuplicateOrderKey {
            build_record_id: 7,
            kind: DependencyKind::External,
            scm_order: 3,
        };
        let message = err.to_string();
        assert!(message.contains("ECM"));
        assert!(message.contains('3'));
    }
}
