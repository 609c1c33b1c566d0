//! Build milestone state machine
//!
//! Composes the catalog check with the history ledger. A transition reads a
//! snapshot (catalog plus the build's current milestone), decides, then
//! commits the build update and the ledger append as one unit. The store
//! re-checks the observed milestone on commit, so two racing transitions
//! cannot both be validated against the same prior state.
//!
//! Notifying the change-management system happens after the commit and is
//! best-effort: a failure is logged and never changes the outcome.

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::build::BuildRecordId;
use crate::core::history::{MilestoneHistory, MilestoneTransitionEvent, NewTransitionEvent};
use crate::core::milestone::{Milestone, MilestoneCatalog, MilestoneId};
use crate::error::{NotifyError, StoreError, TransitionError};

/// Persistence the state machine needs
pub trait MilestoneStore {
    /// Every milestone, active or not
    fn load_catalog(&self) -> Result<MilestoneCatalog, StoreError>;

    /// The build's current milestone id; `None` when the build does not exist
    fn current_milestone_id(&self, build_record_id: BuildRecordId) -> Result<Option<MilestoneId>, StoreError>;

    /// Atomically move the build from `event.previous_milestone_id` to
    /// `event.new_milestone_id` and append the event.
    ///
    /// Returns the new event id, or `None` (with nothing applied) when the
    /// build no longer sits on the previous milestone.
    fn commit_transition(&self, event: &NewTransitionEvent) -> Result<Option<i64>, StoreError>;

    /// Recorded events for a build, in any order
    fn transition_events(&self, build_record_id: BuildRecordId) -> Result<Vec<MilestoneTransitionEvent>, StoreError>;

    /// Change-management reference for the build, if it has one
    fn notification_reference(&self, build_record_id: BuildRecordId) -> Result<Option<String>, StoreError>;
}

/// Sink for milestone change notifications
#[allow(async_fn_in_trait)]
pub trait MilestoneNotifier {
    /// Tell the change-management system that a record reached a milestone
    async fn notify_milestone_change(
        &self,
        reference: &str,
        milestone: &str,
        comment: Option<&str>,
    ) -> Result<(), NotifyError>;
}

/// Notifier used when no change-management endpoint is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledNotifier;

impl MilestoneNotifier for DisabledNotifier {
    async fn notify_milestone_change(
        &self,
        reference: &str,
        milestone: &str,
        _comment: Option<&str>,
    ) -> Result<(), NotifyError> {
        debug!(
            "Notifier disabled; not reporting '{}' for record {}",
            milestone, reference
        );
        Ok(())
    }
}

/// A request to move a build to a milestone
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub build_record_id: BuildRecordId,
    /// Target milestone display name (case-insensitive)
    pub target: String,
    pub actor: String,
    pub comment: Option<String>,
}

/// What happened to the change-management notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum NotificationStatus {
    Sent,
    /// The build has no change-management reference
    Skipped,
    /// Delivery failed; the transition stands
    Failed(String),
}

/// Result of an applied transition
#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
    pub event: MilestoneTransitionEvent,
    pub previous: Milestone,
    pub current: Milestone,
    pub notification: NotificationStatus,
}

/// Entry point for milestone queries and transitions
pub struct MilestoneTracker<'a, S, N> {
    store: &'a S,
    notifier: &'a N,
}

impl<'a, S: MilestoneStore, N: MilestoneNotifier> MilestoneTracker<'a, S, N> {
    pub fn new(store: &'a S, notifier: &'a N) -> Self {
        Self { store, notifier }
    }

    /// Resolve a milestone by name; `None` when it does not exist
    pub fn try_resolve(&self, name: &str) -> Result<Option<Milestone>, StoreError> {
        Ok(self.store.load_catalog()?.try_resolve(name).cloned())
    }

    fn current_in(
        &self,
        catalog: &MilestoneCatalog,
        build_record_id: BuildRecordId,
    ) -> Result<Milestone, TransitionError> {
        let id = self
            .store
            .current_milestone_id(build_record_id)?
            .ok_or(TransitionError::BuildNotFound { build_record_id })?;
        catalog
            .get(id)
            .cloned()
            .ok_or_else(|| TransitionError::UnknownMilestone {
                name: format!("#{id}"),
            })
    }

    /// The milestone a build currently sits on
    pub fn current_milestone(&self, build_record_id: BuildRecordId) -> Result<Milestone, TransitionError> {
        let catalog = self.store.load_catalog()?;
        self.current_in(&catalog, build_record_id)
    }

    /// Active milestones the build may move to, in progression order
    pub fn available_progressions(
        &self,
        build_record_id: BuildRecordId,
    ) -> Result<Vec<Milestone>, TransitionError> {
        let catalog = self.store.load_catalog()?;
        let current = self.current_in(&catalog, build_record_id)?;
        Ok(catalog
            .available_progressions(&current)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Validate and apply a transition, then notify best-effort
    pub async fn apply_transition(
        &self,
        request: &TransitionRequest,
    ) -> Result<TransitionOutcome, TransitionError> {
        let catalog = self.store.load_catalog()?;

        let target = catalog
            .try_resolve(&request.target)
            .cloned()
            .ok_or_else(|| TransitionError::UnknownMilestone {
                name: request.target.clone(),
            })?;
        let current = self.current_in(&catalog, request.build_record_id)?;
        catalog.check_progression(&current, &target)?;

        let new_event = NewTransitionEvent {
            build_record_id: request.build_record_id,
            previous_milestone_id: current.id,
            new_milestone_id: target.id,
            actor: request.actor.clone(),
            comment: request.comment.clone(),
            recorded_at: Utc::now(),
        };
        let id = self
            .store
            .commit_transition(&new_event)?
            .ok_or(TransitionError::ConcurrentTransition {
                build_record_id: request.build_record_id,
            })?;

        info!(
            "Build {} moved from '{}' to '{}' by {}",
            request.build_record_id, current.name, target.name, request.actor
        );

        let notification = self
            .notify(request.build_record_id, &target, request.comment.as_deref())
            .await;

        let NewTransitionEvent {
            build_record_id,
            previous_milestone_id,
            new_milestone_id,
            actor,
            comment,
            recorded_at,
        } = new_event;

        Ok(TransitionOutcome {
            event: MilestoneTransitionEvent {
                id,
                build_record_id,
                previous_milestone_id,
                new_milestone_id,
                actor,
                comment,
                recorded_at,
            },
            previous: current,
            current: target,
            notification,
        })
    }

    async fn notify(
        &self,
        build_record_id: BuildRecordId,
        milestone: &Milestone,
        comment: Option<&str>,
    ) -> NotificationStatus {
        let reference = match self.store.notification_reference(build_record_id) {
            Ok(Some(reference)) => reference,
            Ok(None) => {
                info!(
                    "Build {} has no change-management record; skipping notification",
                    build_record_id
                );
                return NotificationStatus::Skipped;
            }
            Err(e) => {
                warn!("Could not look up change-management record for build {}: {}", build_record_id, e);
                return NotificationStatus::Failed(e.to_string());
            }
        };

        match self
            .notifier
            .notify_milestone_change(&reference, &milestone.name, comment)
            .await
        {
            Ok(()) => NotificationStatus::Sent,
            Err(e) => {
                warn!(
                    "Milestone change for build {} was not delivered: {}",
                    build_record_id, e
                );
                NotificationStatus::Failed(e.to_string())
            }
        }
    }

    /// The build's audit trail, oldest first
    pub fn history(&self, build_record_id: BuildRecordId) -> Result<MilestoneHistory, TransitionError> {
        if self.store.current_milestone_id(build_record_id)?.is_none() {
            return Err(TransitionError::BuildNotFound { build_record_id });
        }
        let events = self.store.transition_events(build_record_id)?;
        Ok(MilestoneHistory::new(build_record_id, events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    struct MemoryStore {
        catalog: Vec<Milestone>,
        builds: RefCell<HashMap<BuildRecordId, MilestoneId>>,
        events: RefCell<Vec<MilestoneTransitionEvent>>,
        reference: Option<String>,
        /// Move the build to this milestone just before the next commit
        interfere: Cell<Option<MilestoneId>>,
    }

    impl MemoryStore {
        fn new() -> Self {
            let m = |id, name: &str, level, active| Milestone {
                id,
                name: name.to_string(),
                level,
                active,
            };
            Self {
                catalog: vec![
                    m(1, "Dev", 0, true),
                    m(2, "QA", 10, true),
                    m(3, "Release", 20, true),
                    m(4, "Retired", 30, false),
                ],
                builds: RefCell::new(HashMap::from([(7, 1)])),
                events: RefCell::new(Vec::new()),
                reference: Some("ECM-7".to_string()),
                interfere: Cell::new(None),
            }
        }

        fn current(&self) -> MilestoneId {
            self.builds.borrow()[&7]
        }
    }

    impl MilestoneStore for MemoryStore {
        fn load_catalog(&self) -> Result<MilestoneCatalog, StoreError> {
            Ok(MilestoneCatalog::new(self.catalog.clone()))
        }

        fn current_milestone_id(&self, id: BuildRecordId) -> Result<Option<MilestoneId>, StoreError> {
            Ok(self.builds.borrow().get(&id).copied())
        }

        fn commit_transition(&self, event: &NewTransitionEvent) -> Result<Option<i64>, StoreError> {
            if let Some(other) = self.interfere.take() {
                self.builds.borrow_mut().insert(event.build_record_id, other);
            }
            let mut builds = self.builds.borrow_mut();
            let Some(current) = builds.get_mut(&event.build_record_id) else {
                return Ok(None);
            };
            if *current != event.previous_milestone_id {
                return Ok(None);
            }
            *current = event.new_milestone_id;

            let mut events = self.events.borrow_mut();
            let id = events.len() as i64 + 1;
            events.push(MilestoneTransitionEvent {
                id,
                build_record_id: event.build_record_id,
                previous_milestone_id: event.previous_milestone_id,
                new_milestone_id: event.new_milestone_id,
                actor: event.actor.clone(),
                comment: event.comment.clone(),
                recorded_at: event.recorded_at,
            });
            Ok(Some(id))
        }

        fn transition_events(&self, id: BuildRecordId) -> Result<Vec<MilestoneTransitionEvent>, StoreError> {
            Ok(self
                .events
                .borrow()
                .iter()
                .filter(|e| e.build_record_id == id)
                .cloned()
                .collect())
        }

        fn notification_reference(&self, _id: BuildRecordId) -> Result<Option<String>, StoreError> {
            Ok(self.reference.clone())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        fail: bool,
        calls: RefCell<Vec<(String, String)>>,
    }

    impl MilestoneNotifier for RecordingNotifier {
        async fn notify_milestone_change(
            &self,
            reference: &str,
            milestone: &str,
            _comment: Option<&str>,
        ) -> Result<(), NotifyError> {
            self.calls
                .borrow_mut()
                .push((reference.to_string(), milestone.to_string()));
            if self.fail {
                Err(NotifyError::Status {
                    url: "http://ecm".to_string(),
                    status: 503,
                })
            } else {
                Ok(())
            }
        }
    }

    fn request(target: &str) -> TransitionRequest {
        TransitionRequest {
            build_record_id: 7,
            target: target.to_string(),
            actor: "alice".to_string(),
            comment: Some("promoted".to_string()),
        }
    }

    #[tokio::test]
    async fn test_promote_then_demote() {
        let store = MemoryStore::new();
        let notifier = RecordingNotifier::default();
        let tracker = MilestoneTracker::new(&store, &notifier);

        let outcome = tracker.apply_transition(&request("QA")).await.unwrap();
        assert_eq!(outcome.previous.name, "Dev");
        assert_eq!(outcome.current.name, "QA");
        assert_eq!(outcome.notification, NotificationStatus::Sent);
        assert_eq!(store.current(), 2);

        let err = tracker.apply_transition(&request("Dev")).await.unwrap_err();
        assert!(matches!(err, TransitionError::IllegalProgression { .. }));
        assert_eq!(store.current(), 2);

        let history = tracker.history(7).unwrap();
        assert_eq!(history.len(), 1);
        let event = history.last().unwrap();
        assert_eq!((event.previous_milestone_id, event.new_milestone_id), (1, 2));
        assert_eq!(notifier.calls.borrow().as_slice(), &[("ECM-7".to_string(), "QA".to_string())]);
    }

    #[tokio::test]
    async fn test_same_milestone_is_audited() {
        let store = MemoryStore::new();
        let tracker = MilestoneTracker::new(&store, &DisabledNotifier);

        tracker.apply_transition(&request("dev")).await.unwrap();
        tracker.apply_transition(&request("DEV")).await.unwrap();

        let history = tracker.history(7).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(MilestoneTransitionEvent::is_noop));
    }

    #[tokio::test]
    async fn test_unknown_milestone_and_missing_build() {
        let store = MemoryStore::new();
        let tracker = MilestoneTracker::new(&store, &DisabledNotifier);

        let err = tracker.apply_transition(&request("Staging")).await.unwrap_err();
        assert!(matches!(err, TransitionError::UnknownMilestone { .. }));

        let mut missing = request("QA");
        missing.build_record_id = 99;
        let err = tracker.apply_transition(&missing).await.unwrap_err();
        assert!(matches!(err, TransitionError::BuildNotFound { build_record_id: 99 }));
        assert!(matches!(tracker.history(99), Err(TransitionError::BuildNotFound { .. })));
    }

    #[tokio::test]
    async fn test_inactive_target_rejected() {
        let store = MemoryStore::new();
        let tracker = MilestoneTracker::new(&store, &DisabledNotifier);
        let err = tracker.apply_transition(&request("Retired")).await.unwrap_err();
        assert!(matches!(err, TransitionError::IllegalProgression { inactive: true, .. }));
        assert!(store.events.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_notifier_failure_keeps_transition() {
        let store = MemoryStore::new();
        let notifier = RecordingNotifier {
            fail: true,
            ..RecordingNotifier::default()
        };
        let tracker = MilestoneTracker::new(&store, &notifier);

        let outcome = tracker.apply_transition(&request("QA")).await.unwrap();
        assert!(matches!(outcome.notification, NotificationStatus::Failed(_)));
        assert_eq!(store.current(), 2);
        assert_eq!(tracker.history(7).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_reference_skips_notification() {
        let mut store = MemoryStore::new();
        store.reference = None;
        let notifier = RecordingNotifier::default();
        let tracker = MilestoneTracker::new(&store, &notifier);

        let outcome = tracker.apply_transition(&request("QA")).await.unwrap();
        assert_eq!(outcome.notification, NotificationStatus::Skipped);
        assert!(notifier.calls.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_change_detected() {
        let store = MemoryStore::new();
        store.interfere.set(Some(3));
        let tracker = MilestoneTracker::new(&store, &DisabledNotifier);

        let err = tracker.apply_transition(&request("QA")).await.unwrap_err();
        assert!(matches!(err, TransitionError::ConcurrentTransition { build_record_id: 7 }));
        assert_eq!(store.current(), 3);
        assert!(store.events.borrow().is_empty());
    }

    #[test]
    fn test_available_progressions() {
        let store = MemoryStore::new();
        store.builds.borrow_mut().insert(7, 2);
        let tracker = MilestoneTracker::new(&store, &DisabledNotifier);
        let names: Vec<String> = tracker
            .available_progressions(7)
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["QA", "Release"]);
        assert_eq!(tracker.current_milestone(7).unwrap().name, "QA");
    }
}
