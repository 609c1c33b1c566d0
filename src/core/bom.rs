//! Bill of materials
//!
//! A BOM records what went into a build: the build system, agents, code
//! exports and the two dependency relations. Internal ("Orbit") dependencies
//! point at other build records; external ("ECM") dependencies point at
//! packages outside this system. Once a BOM is locked nothing more can be
//! appended to it.

use serde::{Deserialize, Serialize};

use crate::core::build::BuildRecordId;
use crate::error::BomError;

/// Dependency relation an edge belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// Another build record produced by this system
    Internal,
    /// A package from outside this system
    External,
}

impl std::fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Internal => write!(f, "Orbit"),
            Self::External => write!(f, "ECM"),
        }
    }
}

/// BOM header for a build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bom {
    pub id: i64,
    pub build_record_id: BuildRecordId,
    pub bom_type: String,
    pub build_system: String,
    pub build_system_version: String,
    pub antivirus_dat_version: Option<String>,
    /// Record id of this build's mock entry in the change-management system
    pub ecm_mock_master_record_id: Option<String>,
    pub locked: bool,
}

/// Input for creating a BOM
#[derive(Debug, Clone)]
pub struct NewBom {
    pub build_record_id: BuildRecordId,
    pub bom_type: String,
    pub build_system: String,
    pub build_system_version: String,
}

/// Ensure a BOM exists and can still be appended to
pub fn ensure_editable(bom: Option<Bom>, build_record_id: BuildRecordId) -> Result<Bom, BomError> {
    match bom {
        None => Err(BomError::NotFound { build_record_id }),
        Some(bom) if bom.locked => Err(BomError::Locked { build_record_id }),
        Some(bom) => Ok(bom),
    }
}

/// Ensure a BOM exists and has not been locked yet
pub fn ensure_lockable(bom: Option<Bom>, build_record_id: BuildRecordId) -> Result<Bom, BomError> {
    match bom {
        None => Err(BomError::NotFound { build_record_id }),
        Some(bom) if bom.locked => Err(BomError::AlreadyLocked { build_record_id }),
        Some(bom) => Ok(bom),
    }
}

/// Identity of a package outside this system
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalPackage {
    pub master_id: String,
    pub project_name: String,
    pub version: String,
    pub build_number: i64,
    pub package_number: String,
}

impl std::fmt::Display for ExternalPackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} (build {}, package {})",
            self.project_name, self.version, self.build_number, self.package_number
        )
    }
}

/// Dependency on another build record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrbitDependency {
    pub build_record_id: BuildRecordId,
    pub bom_type: String,
    pub dependency_build_record_id: BuildRecordId,
    pub scm_order: i64,
}

/// Dependency on an external package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcmDependency {
    pub build_record_id: BuildRecordId,
    pub bom_type: String,
    pub package: ExternalPackage,
    pub scm_order: i64,
}

/// One row of either dependency relation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyEdge {
    Internal(OrbitDependency),
    External(EcmDependency),
}

impl DependencyEdge {
    /// Build the edge hangs off
    pub fn source(&self) -> BuildRecordId {
        match self {
            Self::Internal(d) => d.build_record_id,
            Self::External(d) => d.build_record_id,
        }
    }

    /// Declared position within the BOM
    pub fn scm_order(&self) -> i64 {
        match self {
            Self::Internal(d) => d.scm_order,
            Self::External(d) => d.scm_order,
        }
    }

    /// Relation the edge belongs to
    pub fn kind(&self) -> DependencyKind {
        match self {
            Self::Internal(_) => DependencyKind::Internal,
            Self::External(_) => DependencyKind::External,
        }
    }

    /// Key giving the presentation order: SCM order, internal before external on ties
    pub fn sort_key(&self) -> (i64, DependencyKind) {
        (self.scm_order(), self.kind())
    }
}

/// Sort edges into declared order
pub fn sort_edges(edges: &mut [DependencyEdge]) {
    edges.sort_by_key(DependencyEdge::sort_key);
}

/// Where exported code came from in source control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScmCoordinates {
    pub scm_type: String,
    pub scm_version: String,
    pub scm_protocol: String,
    pub scm_server: String,
    pub scm_path: String,
    pub scm_tag: Option<String>,
    pub scm_commit: Option<String>,
}

/// Code exported into a build, in declared order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeExport {
    pub build_record_id: BuildRecordId,
    pub bom_type: String,
    #[serde(flatten)]
    pub scm: ScmCoordinates,
    pub scm_order: i64,
}

/// Full BOM with its child rows, for display
#[derive(Debug, Clone, Serialize)]
pub struct BomDetails {
    pub bom: Bom,
    pub agents: Vec<String>,
    pub code_exports: Vec<CodeExport>,
    pub orbit_dependencies: Vec<OrbitDependency>,
    pub ecm_dependencies: Vec<EcmDependency>,
}
