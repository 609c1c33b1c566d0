//! Milestone history ledger
//!
//! Every applied transition leaves one immutable event behind. The ledger
//! only ever grows; the current milestone lives on the build record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::build::BuildRecordId;
use crate::core::milestone::{MilestoneCatalog, MilestoneId};

/// A transition about to be recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransitionEvent {
    pub build_record_id: BuildRecordId,
    pub previous_milestone_id: MilestoneId,
    pub new_milestone_id: MilestoneId,
    pub actor: String,
    pub comment: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// A recorded transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneTransitionEvent {
    pub id: i64,
    pub build_record_id: BuildRecordId,
    pub previous_milestone_id: MilestoneId,
    pub new_milestone_id: MilestoneId,
    pub actor: String,
    pub comment: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl MilestoneTransitionEvent {
    /// Whether the build stayed on the same milestone
    pub fn is_noop(&self) -> bool {
        self.previous_milestone_id == self.new_milestone_id
    }
}

/// A history row with milestone names resolved, for display
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub previous_milestone: String,
    pub new_milestone: String,
    pub actor: String,
    pub comment: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// The audit trail of one build, oldest first
#[derive(Debug, Clone, Default)]
pub struct MilestoneHistory {
    build_record_id: BuildRecordId,
    events: Vec<MilestoneTransitionEvent>,
}

impl MilestoneHistory {
    /// Wrap events for a build, ordering them by insertion
    pub fn new(build_record_id: BuildRecordId, mut events: Vec<MilestoneTransitionEvent>) -> Self {
        events.sort_by_key(|e| e.id);
        Self {
            build_record_id,
            events,
        }
    }

    /// Build the history belongs to
    pub fn build_record_id(&self) -> BuildRecordId {
        self.build_record_id
    }

    /// Iterate events oldest first; may be called any number of times
    pub fn iter(&self) -> std::slice::Iter<'_, MilestoneTransitionEvent> {
        self.events.iter()
    }

    /// Number of recorded transitions
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Most recent event
    pub fn last(&self) -> Option<&MilestoneTransitionEvent> {
        self.events.last()
    }

    /// Resolve milestone ids to names
    ///
    /// Ids missing from the catalog render as `#<id>` rather than failing;
    /// the ledger outlives catalog edits.
    pub fn describe(&self, catalog: &MilestoneCatalog) -> Vec<HistoryEntry> {
        let name_of = |id: MilestoneId| {
            catalog
                .get(id)
                .map_or_else(|| format!("#{id}"), |m| m.name.clone())
        };

        self.events
            .iter()
            .map(|e| HistoryEntry {
                id: e.id,
                previous_milestone: name_of(e.previous_milestone_id),
                new_milestone: name_of(e.new_milestone_id),
                actor: e.actor.clone(),
                comment: e.comment.clone(),
                recorded_at: e.recorded_at,
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a MilestoneHistory {
    type Item = &'a MilestoneTransitionEvent;
    type IntoIter = std::slice::Iter<'a, MilestoneTransitionEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
