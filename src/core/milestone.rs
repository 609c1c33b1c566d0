//! Milestone catalog and transition validation
//!
//! Milestones are the ordered stages a build moves through (Dev, QA,
//! Release, ...). Progression is monotonic: a build may stay where it is or
//! move up to an active milestone, never down.

use serde::{Deserialize, Serialize};

use crate::error::TransitionError;

/// Milestone row identity
pub type MilestoneId = i64;

/// A named stage in a build's lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    /// Row identity
    pub id: MilestoneId,
    /// Display name, unique ignoring case
    pub name: String,
    /// Ordinal level; higher is further along
    pub level: i64,
    /// Whether the milestone can currently be progressed to
    pub active: bool,
}

impl Milestone {
    /// Whether `name` refers to this milestone
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name.trim())
    }
}

/// Level ordering on its own, without the active check
pub fn level_permits(from_level: i64, to_level: i64) -> bool {
    to_level >= from_level
}

/// Decide whether a build at `current` may be moved to `target`
///
/// Legal iff the target is active and its level is not below the current
/// level. Equal levels are allowed so a milestone can be re-recorded.
pub fn can_progress(current: &Milestone, target: &Milestone) -> bool {
    target.active && level_permits(current.level, target.level)
}

/// The set of milestones loaded for one request
///
/// Kept sorted by level (ties broken by id) so listings come out in
/// progression order.
#[derive(Debug, Clone, Default)]
pub struct MilestoneCatalog {
    milestones: Vec<Milestone>,
}

impl MilestoneCatalog {
    /// Build a catalog from milestone rows
    pub fn new(mut milestones: Vec<Milestone>) -> Self {
        milestones.sort_by_key(|m| (m.level, m.id));
        Self { milestones }
    }

    /// Case-insensitive lookup by display name
    pub fn try_resolve(&self, name: &str) -> Option<&Milestone> {
        self.milestones.iter().find(|m| m.matches_name(name))
    }

    /// Lookup by identity
    pub fn get(&self, id: MilestoneId) -> Option<&Milestone> {
        self.milestones.iter().find(|m| m.id == id)
    }

    /// All milestones in progression order
    pub fn all(&self) -> &[Milestone] {
        &self.milestones
    }

    /// Active milestones in progression order
    pub fn active(&self) -> impl Iterator<Item = &Milestone> {
        self.milestones.iter().filter(|m| m.active)
    }

    /// Lowest-level active milestone, where new builds start by default
    pub fn initial(&self) -> Option<&Milestone> {
        self.active().next()
    }

    /// Active milestones a build at `current` may move to
    pub fn available_progressions(&self, current: &Milestone) -> Vec<&Milestone> {
        self.milestones
            .iter()
            .filter(|m| can_progress(current, m))
            .collect()
    }

    /// Validate a transition, naming both milestones on failure
    pub fn check_progression(
        &self,
        current: &Milestone,
        target: &Milestone,
    ) -> Result<(), TransitionError> {
        if can_progress(current, target) {
            Ok(())
        } else {
            Err(TransitionError::IllegalProgression {
                current: current.name.clone(),
                attempted: target.name.clone(),
                inactive: !target.active,
            })
        }
    }

    /// Number of milestones
    pub fn len(&self) -> usize {
        self.milestones.len()
    }

    /// Whether the catalog has no milestones
    pub fn is_empty(&self) -> bool {
        self.milestones.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn milestone(id: MilestoneId, name: &str, level: i64, active: bool) -> Milestone {
        Milestone {
            id,
            name: name.to_string(),
            level,
            active,
        }
    }

    fn sample_catalog() -> MilestoneCatalog {
        MilestoneCatalog::new(vec![
            milestone(3, "Release", 20, true),
            milestone(1, "Dev", 0, true),
            milestone(4, "Legacy", 15, false),
            milestone(2, "QA", 10, true),
        ])
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let catalog = sample_catalog();
        assert_eq!(catalog.try_resolve("qa").map(|m| m.id), Some(2));
        assert_eq!(catalog.try_resolve("RELEASE").map(|m| m.id), Some(3));
        assert_eq!(catalog.try_resolve(" Dev ").map(|m| m.id), Some(1));
    }

    #[test]
    fn test_resolve_unknown_returns_none() {
        let catalog = sample_catalog();
        assert!(catalog.try_resolve("Staging").is_none());
    }

    #[test]
    fn test_catalog_sorted_by_level() {
        let catalog = sample_catalog();
        let names: Vec<&str> = catalog.all().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Dev", "QA", "Legacy", "Release"]);
    }

    #[test]
    fn test_initial_is_lowest_active() {
        let catalog = MilestoneCatalog::new(vec![
            milestone(1, "Sandbox", -5, false),
            milestone(2, "Dev", 0, true),
        ]);
        assert_eq!(catalog.initial().map(|m| m.name.as_str()), Some("Dev"));
    }

    #[test]
    fn test_forward_progression_allowed() {
        let catalog = sample_catalog();
        let dev = catalog.try_resolve("Dev").unwrap();
        let qa = catalog.try_resolve("QA").unwrap();
        assert!(catalog.check_progression(dev, qa).is_ok());
    }

    #[test]
    fn test_same_milestone_allowed() {
        let catalog = sample_catalog();
        let qa = catalog.try_resolve("QA").unwrap();
        assert!(catalog.check_progression(qa, qa).is_ok());
    }

    #[test]
    fn test_backward_progression_rejected() {
        let catalog = sample_catalog();
        let dev = catalog.try_resolve("Dev").unwrap();
        let qa = catalog.try_resolve("QA").unwrap();
        let err = catalog.check_progression(qa, dev).unwrap_err();
        match err {
            TransitionError::IllegalProgression {
                current,
                attempted,
                inactive,
            } => {
                assert_eq!(current, "QA");
                assert_eq!(attempted, "Dev");
                assert!(!inactive);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_inactive_target_rejected() {
        let catalog = sample_catalog();
        let dev = catalog.try_resolve("Dev").unwrap();
        let legacy = catalog.try_resolve("Legacy").unwrap();
        assert!(!can_progress(dev, legacy));
        assert!(matches!(
            catalog.check_progression(dev, legacy),
            Err(TransitionError::IllegalProgression { inactive: true, .. })
        ));
    }

    #[test]
    fn test_available_progressions_from_qa() {
        let catalog = sample_catalog();
        let qa = catalog.try_resolve("QA").unwrap();
        let names: Vec<&str> = catalog
            .available_progressions(qa)
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, vec!["QA", "Release"]);
    }

    #[test]
    fn test_available_progressions_from_inactive_current() {
        // A build parked on a retired milestone can still move up
        let catalog = sample_catalog();
        let legacy = catalog.try_resolve("Legacy").unwrap();
        let names: Vec<&str> = catalog
            .available_progressions(legacy)
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, vec!["Release"]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// Monotonicity law: legal iff target level >= current level and target active
        #[test]
        fn prop_can_progress_monotonic(
            from_level in -1000i64..1000,
            to_level in -1000i64..1000,
            from_active: bool,
            to_active: bool,
        ) {
            let current = milestone(1, "A", from_level, from_active);
            let target = milestone(2, "B", to_level, to_active);
            prop_assert_eq!(
                can_progress(&current, &target),
                to_level >= from_level && to_active
            );
        }

        /// Every available progression passes validation and nothing else does
        #[test]
        fn prop_available_progressions_agree_with_check(
            levels in proptest::collection::vec((-50i64..50, any::<bool>()), 1..12),
            pick in any::<prop::sample::Index>(),
        ) {
            let rows: Vec<Milestone> = levels
                .iter()
                .enumerate()
                .map(|(i, (level, active))| milestone(i as i64 + 1, &format!("M{i}"), *level, *active))
                .collect();
            let catalog = MilestoneCatalog::new(rows);
            let current = pick.get(catalog.all()).clone();
            let available: Vec<MilestoneId> =
                catalog.available_progressions(&current).iter().map(|m| m.id).collect();
            for m in catalog.all() {
                prop_assert_eq!(
                    available.contains(&m.id),
                    catalog.check_progression(&current, m).is_ok()
                );
            }
        }
    }
}
