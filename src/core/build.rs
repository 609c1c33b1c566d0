//! Build records
//!
//! A build record is created once per build invocation. Post-hoc fields
//! (result, artifacts, coverage, steps) are filled in as the pipeline runs;
//! the milestone field only changes through [`crate::core::transition`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::milestone::{Milestone, MilestoneCatalog, MilestoneId};
use crate::error::BuildError;

/// Build record identity
pub type BuildRecordId = i64;

/// A recorded build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub id: BuildRecordId,
    /// Component reference from the taxonomy
    pub component_id: i64,
    pub build_number: i64,
    pub branch: String,
    /// Current milestone
    pub milestone_id: MilestoneId,
    pub build_result: Option<String>,
    pub build_comment: Option<String>,
    /// Where the build artifacts live
    pub artifact_url: Option<String>,
    pub code_coverage: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Input for registering a build
#[derive(Debug, Clone)]
pub struct NewBuildRecord {
    pub component_id: i64,
    pub build_number: i64,
    pub branch: String,
    /// Starting milestone name; defaults to the lowest active milestone
    pub milestone: Option<String>,
}

impl NewBuildRecord {
    /// Resolve the starting milestone against the catalog
    pub fn initial_milestone<'c>(
        &self,
        catalog: &'c MilestoneCatalog,
    ) -> Result<&'c Milestone, BuildError> {
        match &self.milestone {
            Some(name) => catalog
                .try_resolve(name)
                .ok_or_else(|| BuildError::UnknownMilestone { name: name.clone() }),
            None => catalog.initial().ok_or(BuildError::NoActiveMilestones),
        }
    }
}

/// A named step of a build and its latest result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStep {
    pub id: i64,
    pub build_record_id: BuildRecordId,
    pub step_name: String,
    pub step_result: String,
    pub recorded_at: DateTime<Utc>,
}

/// What happened when a step was reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepWrite {
    /// First report of the step
    Inserted,
    /// Step existed; its result was replaced
    Updated,
}

/// Validate a coverage percentage
pub fn validate_coverage(value: f64) -> Result<f64, BuildError> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(value)
    } else {
        Err(BuildError::CoverageOutOfRange { value })
    }
}

/// How a build search matches milestones
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MilestoneMatch {
    /// Only builds sitting on exactly this milestone
    Exact,
    /// Builds on any active milestone at this level or above
    AtLeast,
}

/// Pick the latest build of a component that satisfies a milestone filter
///
/// "Latest" is the highest build number; ties fall to the newest record.
pub fn select_latest_build<'b>(
    candidates: &'b [BuildRecord],
    catalog: &MilestoneCatalog,
    milestone: &Milestone,
    matching: MilestoneMatch,
) -> Option<&'b BuildRecord> {
    candidates
        .iter()
        .filter(|b| match matching {
            MilestoneMatch::Exact => b.milestone_id == milestone.id,
            MilestoneMatch::AtLeast => catalog
                .get(b.milestone_id)
                .is_some_and(|m| m.active && m.level >= milestone.level),
        })
        .max_by_key(|b| (b.build_number, b.id))
}
