//! Milestone catalog and transition ledger storage

use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::{debug, info};

use super::{is_constraint_violation, Database};
use crate::config::defaults::DEFAULT_MILESTONES;
use crate::core::build::BuildRecordId;
use crate::core::history::{MilestoneTransitionEvent, NewTransitionEvent};
use crate::core::milestone::{Milestone, MilestoneCatalog, MilestoneId};
use crate::core::transition::MilestoneStore;
use crate::error::{MilestoneError, StoreError};

fn milestone_from_row(row: &Row<'_>) -> rusqlite::Result<Milestone> {
    Ok(Milestone {
        id: row.get(0)?,
        name: row.get(1)?,
        level: row.get(2)?,
        active: row.get(3)?,
    })
}

fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Milestone>, StoreError> {
    conn.query_row(
        "SELECT id, name, level, active FROM milestones WHERE name = ?1",
        params![name.trim()],
        milestone_from_row,
    )
    .optional()
    .map_err(StoreError::query("find milestone"))
}

impl Database {
    /// Add a milestone to the catalog
    pub fn define_milestone(&self, name: &str, level: i64, active: bool) -> Result<Milestone, MilestoneError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(MilestoneError::EmptyName);
        }

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO milestones (name, level, active) VALUES (?1, ?2, ?3)",
                params![name, level, active],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    MilestoneError::Duplicate {
                        name: name.to_string(),
                    }
                } else {
                    StoreError::query("insert milestone")(e).into()
                }
            })?;

            info!("Defined milestone '{}' at level {}", name, level);
            Ok(Milestone {
                id: conn.last_insert_rowid(),
                name: name.to_string(),
                level,
                active,
            })
        })
    }

    /// Toggle whether builds may progress to a milestone
    pub fn set_milestone_active(&self, name: &str, active: bool) -> Result<Milestone, MilestoneError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE milestones SET active = ?1 WHERE name = ?2",
                    params![active, name.trim()],
                )
                .map_err(StoreError::query("update milestone"))?;
            if changed == 0 {
                return Err(MilestoneError::NotFound {
                    name: name.to_string(),
                });
            }

            let milestone = find_by_name(conn, name)?.ok_or_else(|| MilestoneError::NotFound {
                name: name.to_string(),
            })?;
            info!(
                "Milestone '{}' is now {}",
                milestone.name,
                if active { "active" } else { "inactive" }
            );
            Ok(milestone)
        })
    }

    /// All milestones in progression order
    pub fn list_milestones(&self) -> Result<Vec<Milestone>, StoreError> {
        Ok(self.load_catalog()?.all().to_vec())
    }

    /// Insert the default milestone set, skipping names that exist
    ///
    /// Returns how many milestones were added.
    pub fn seed_default_milestones(&self) -> Result<usize, StoreError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction().map_err(StoreError::query("begin seed"))?;
            let mut added = 0;
            for (name, level) in DEFAULT_MILESTONES {
                added += tx
                    .execute(
                        "INSERT OR IGNORE INTO milestones (name, level, active) VALUES (?1, ?2, 1)",
                        params![name, level],
                    )
                    .map_err(StoreError::query("seed milestone"))?;
            }
            tx.commit().map_err(StoreError::query("commit seed"))?;
            info!("Seeded {} default milestones", added);
            Ok(added)
        })
    }
}

impl MilestoneStore for Database {
    fn load_catalog(&self) -> Result<MilestoneCatalog, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, name, level, active FROM milestones")
                .map_err(StoreError::query("load milestones"))?;
            let rows = stmt
                .query_map([], milestone_from_row)
                .map_err(StoreError::query("load milestones"))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(StoreError::query("load milestones"))?;
            debug!("Loaded {} milestones", rows.len());
            Ok(MilestoneCatalog::new(rows))
        })
    }

    fn current_milestone_id(&self, build_record_id: BuildRecordId) -> Result<Option<MilestoneId>, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT milestone_id FROM build_records WHERE id = ?1",
                params![build_record_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::query("read current milestone"))
        })
    }

    fn commit_transition(&self, event: &NewTransitionEvent) -> Result<Option<i64>, StoreError> {
        self.with_conn_mut(|conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(StoreError::query("begin transition"))?;

            let changed = tx
                .execute(
                    "UPDATE build_records SET milestone_id = ?1 WHERE id = ?2 AND milestone_id = ?3",
                    params![
                        event.new_milestone_id,
                        event.build_record_id,
                        event.previous_milestone_id
                    ],
                )
                .map_err(StoreError::query("update build milestone"))?;
            if changed == 0 {
                // Dropping the transaction rolls it back
                return Ok(None);
            }

            tx.execute(
                "INSERT INTO milestone_history
                 (build_record_id, previous_milestone_id, new_milestone_id, actor, comment, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    event.build_record_id,
                    event.previous_milestone_id,
                    event.new_milestone_id,
                    event.actor,
                    event.comment,
                    event.recorded_at
                ],
            )
            .map_err(StoreError::query("append milestone history"))?;
            let id = tx.last_insert_rowid();

            tx.commit().map_err(StoreError::query("commit transition"))?;
            Ok(Some(id))
        })
    }

    fn transition_events(&self, build_record_id: BuildRecordId) -> Result<Vec<MilestoneTransitionEvent>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, build_record_id, previous_milestone_id, new_milestone_id,
                            actor, comment, recorded_at
                     FROM milestone_history WHERE build_record_id = ?1 ORDER BY id",
                )
                .map_err(StoreError::query("read milestone history"))?;
            let events = stmt
                .query_map(params![build_record_id], |row| {
                    Ok(MilestoneTransitionEvent {
                        id: row.get(0)?,
                        build_record_id: row.get(1)?,
                        previous_milestone_id: row.get(2)?,
                        new_milestone_id: row.get(3)?,
                        actor: row.get(4)?,
                        comment: row.get(5)?,
                        recorded_at: row.get(6)?,
                    })
                })
                .map_err(StoreError::query("read milestone history"))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(StoreError::query("read milestone history"))?;
            Ok(events)
        })
    }

    fn notification_reference(&self, build_record_id: BuildRecordId) -> Result<Option<String>, StoreError> {
        self.with_conn(|conn| {
            let reference: Option<Option<String>> = conn
                .query_row(
                    "SELECT ecm_mock_master_record_id FROM boms WHERE build_record_id = ?1",
                    params![build_record_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(StoreError::query("read notification reference"))?;
            Ok(reference.flatten())
        })
    }
}
