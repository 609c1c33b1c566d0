//! Build record storage

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::{debug, info};

use super::{is_constraint_violation, Database};
use crate::core::build::{
    select_latest_build, validate_coverage, BuildRecord, BuildRecordId, BuildStep, MilestoneMatch,
    NewBuildRecord, StepWrite,
};
use crate::core::transition::MilestoneStore;
use crate::error::{BuildError, StoreError};

const BUILD_COLUMNS: &str = "id, component_id, build_number, branch, milestone_id, build_result,
    build_comment, artifact_url, code_coverage, created_at";

fn build_from_row(row: &Row<'_>) -> rusqlite::Result<BuildRecord> {
    Ok(BuildRecord {
        id: row.get(0)?,
        component_id: row.get(1)?,
        build_number: row.get(2)?,
        branch: row.get(3)?,
        milestone_id: row.get(4)?,
        build_result: row.get(5)?,
        build_comment: row.get(6)?,
        artifact_url: row.get(7)?,
        code_coverage: row.get(8)?,
        created_at: row.get(9)?,
    })
}

pub(crate) fn get_build(conn: &Connection, id: BuildRecordId) -> Result<Option<BuildRecord>, StoreError> {
    conn.query_row(
        &format!("SELECT {BUILD_COLUMNS} FROM build_records WHERE id = ?1"),
        params![id],
        build_from_row,
    )
    .optional()
    .map_err(StoreError::query("get build record"))
}

pub(crate) fn build_exists(conn: &Connection, id: BuildRecordId) -> Result<bool, StoreError> {
    conn.query_row("SELECT 1 FROM build_records WHERE id = ?1", params![id], |_| Ok(()))
        .optional()
        .map(|found| found.is_some())
        .map_err(StoreError::query("check build record"))
}

impl Database {
    /// Register a build at its initial milestone
    pub fn create_build(&self, input: &NewBuildRecord) -> Result<BuildRecord, BuildError> {
        let catalog = self.load_catalog()?;
        let milestone = input.initial_milestone(&catalog)?;
        let created_at = Utc::now();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO build_records (component_id, build_number, branch, milestone_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    input.component_id,
                    input.build_number,
                    input.branch,
                    milestone.id,
                    created_at
                ],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    BuildError::AlreadyExists {
                        component_id: input.component_id,
                        build_number: input.build_number,
                        branch: input.branch.clone(),
                    }
                } else {
                    StoreError::query("insert build record")(e).into()
                }
            })?;

            let id = conn.last_insert_rowid();
            info!(
                "Created build record {} (component {} #{} on {}) at '{}'",
                id, input.component_id, input.build_number, input.branch, milestone.name
            );

            Ok(BuildRecord {
                id,
                component_id: input.component_id,
                build_number: input.build_number,
                branch: input.branch.clone(),
                milestone_id: milestone.id,
                build_result: None,
                build_comment: None,
                artifact_url: None,
                code_coverage: None,
                created_at,
            })
        })
    }

    /// Look up a build; `None` when it does not exist
    pub fn find_build(&self, id: BuildRecordId) -> Result<Option<BuildRecord>, StoreError> {
        self.with_conn(|conn| get_build(conn, id))
    }

    /// Look up a build that must exist
    pub fn build(&self, id: BuildRecordId) -> Result<BuildRecord, BuildError> {
        self.find_build(id)?
            .ok_or(BuildError::NotFound { build_record_id: id })
    }

    fn update_build(
        &self,
        id: BuildRecordId,
        operation: &'static str,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<(), BuildError> {
        let changed = self.with_conn(|conn| conn.execute(sql, params).map_err(StoreError::query(operation)))?;
        if changed == 0 {
            return Err(BuildError::NotFound { build_record_id: id });
        }
        info!("Build record {}: {}", id, operation);
        Ok(())
    }

    /// Record the final result of a build
    pub fn set_build_result(&self, id: BuildRecordId, result: &str, comment: Option<&str>) -> Result<(), BuildError> {
        self.update_build(
            id,
            "set build result",
            "UPDATE build_records SET build_result = ?1, build_comment = ?2 WHERE id = ?3",
            params![result, comment, id],
        )
    }

    /// Record where the build's artifacts were published
    pub fn set_artifact_url(&self, id: BuildRecordId, url: &str) -> Result<(), BuildError> {
        self.update_build(
            id,
            "set artifact location",
            "UPDATE build_records SET artifact_url = ?1 WHERE id = ?2",
            params![url, id],
        )
    }

    /// Record the build's code coverage percentage
    pub fn set_code_coverage(&self, id: BuildRecordId, coverage: f64) -> Result<(), BuildError> {
        let coverage = validate_coverage(coverage)?;
        self.update_build(
            id,
            "set code coverage",
            "UPDATE build_records SET code_coverage = ?1 WHERE id = ?2",
            params![coverage, id],
        )
    }

    /// Report a build step: inserted the first time, result replaced afterwards
    pub fn upsert_build_step(&self, id: BuildRecordId, step_name: &str, step_result: &str) -> Result<StepWrite, BuildError> {
        self.with_conn_mut(|conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(StoreError::query("begin build step"))?;

            if !build_exists(&tx, id)? {
                return Err(BuildError::NotFound { build_record_id: id });
            }

            let now = Utc::now();
            let updated = tx
                .execute(
                    "UPDATE build_steps SET step_result = ?1, recorded_at = ?2
                     WHERE build_record_id = ?3 AND step_name = ?4",
                    params![step_result, now, id, step_name],
                )
                .map_err(StoreError::query("update build step"))?;

            let write = if updated == 0 {
                tx.execute(
                    "INSERT INTO build_steps (build_record_id, step_name, step_result, recorded_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![id, step_name, step_result, now],
                )
                .map_err(StoreError::query("insert build step"))?;
                StepWrite::Inserted
            } else {
                StepWrite::Updated
            };

            tx.commit().map_err(StoreError::query("commit build step"))?;
            debug!("Build record {} step '{}': {:?}", id, step_name, write);
            Ok(write)
        })
    }

    /// Steps reported for a build, in first-reported order
    pub fn build_steps(&self, id: BuildRecordId) -> Result<Vec<BuildStep>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, build_record_id, step_name, step_result, recorded_at
                     FROM build_steps WHERE build_record_id = ?1 ORDER BY id",
                )
                .map_err(StoreError::query("list build steps"))?;
            let steps = stmt
                .query_map(params![id], |row| {
                    Ok(BuildStep {
                        id: row.get(0)?,
                        build_record_id: row.get(1)?,
                        step_name: row.get(2)?,
                        step_result: row.get(3)?,
                        recorded_at: row.get(4)?,
                    })
                })
                .map_err(StoreError::query("list build steps"))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(StoreError::query("list build steps"))?;
            Ok(steps)
        })
    }

    /// All builds of a component, optionally restricted to a branch
    pub fn builds_of_component(&self, component_id: i64, branch: Option<&str>) -> Result<Vec<BuildRecord>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {BUILD_COLUMNS} FROM build_records
                     WHERE component_id = ?1 AND (?2 IS NULL OR branch = ?2)
                     ORDER BY build_number, id"
                ))
                .map_err(StoreError::query("list component builds"))?;
            let builds = stmt
                .query_map(params![component_id, branch], build_from_row)
                .map_err(StoreError::query("list component builds"))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(StoreError::query("list component builds"))?;
            Ok(builds)
        })
    }

    /// Latest build of a component that reached a milestone
    pub fn find_latest_build(
        &self,
        component_id: i64,
        branch: Option<&str>,
        milestone: &str,
        matching: MilestoneMatch,
    ) -> Result<Option<BuildRecord>, BuildError> {
        let catalog = self.load_catalog()?;
        let milestone = catalog
            .try_resolve(milestone)
            .ok_or_else(|| BuildError::UnknownMilestone {
                name: milestone.to_string(),
            })?;

        let candidates = self.builds_of_component(component_id, branch)?;
        let found = select_latest_build(&candidates, &catalog, milestone, matching).cloned();
        debug!(
            "Search for component {} at '{}' ({:?}) matched {:?}",
            component_id,
            milestone.name,
            matching,
            found.as_ref().map(|b| b.id)
        );
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.seed_default_milestones().unwrap();
        db
    }

    fn new_build(number: i64) -> NewBuildRecord {
        NewBuildRecord {
            component_id: 42,
            build_number: number,
            branch: "main".to_string(),
            milestone: None,
        }
    }

    #[test]
    fn test_create_starts_at_lowest_milestone() {
        let db = seeded();
        let build = db.create_build(&new_build(1)).unwrap();
        let dev = db.load_catalog().unwrap().try_resolve("Dev").unwrap().id;
        assert_eq!(build.milestone_id, dev);
        assert_eq!(db.build(build.id).unwrap().build_number, 1);
    }

    #[test]
    fn test_duplicate_build_rejected() {
        let db = seeded();
        db.create_build(&new_build(1)).unwrap();
        assert!(matches!(
            db.create_build(&new_build(1)),
            Err(BuildError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn test_post_hoc_fields() {
        let db = seeded();
        let id = db.create_build(&new_build(1)).unwrap().id;
        db.set_build_result(id, "Succeeded", Some("green")).unwrap();
        db.set_artifact_url(id, "https://artifacts/1").unwrap();
        db.set_code_coverage(id, 81.5).unwrap();

        let build = db.build(id).unwrap();
        assert_eq!(build.build_result.as_deref(), Some("Succeeded"));
        assert_eq!(build.artifact_url.as_deref(), Some("https://artifacts/1"));
        assert_eq!(build.code_coverage, Some(81.5));

        assert!(matches!(db.set_code_coverage(id, 101.0), Err(BuildError::CoverageOutOfRange { .. })));
        assert!(matches!(db.set_artifact_url(999, "x"), Err(BuildError::NotFound { .. })));
    }

    #[test]
    fn test_step_upsert() {
        let db = seeded();
        let id = db.create_build(&new_build(1)).unwrap().id;
        assert_eq!(db.upsert_build_step(id, "compile", "running").unwrap(), StepWrite::Inserted);
        assert_eq!(db.upsert_build_step(id, "compile", "passed").unwrap(), StepWrite::Updated);

        let steps = db.build_steps(id).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].step_result, "passed");
        assert!(matches!(
            db.upsert_build_step(999, "compile", "passed"),
            Err(BuildError::NotFound { .. })
        ));
    }

    #[test]
    fn test_find_latest_build() {
        let db = seeded();
        db.create_build(&new_build(1)).unwrap();
        let mut qa = new_build(2);
        qa.milestone = Some("QA".to_string());
        db.create_build(&qa).unwrap();
        db.create_build(&new_build(3)).unwrap();

        let found = db
            .find_latest_build(42, None, "qa", MilestoneMatch::AtLeast)
            .unwrap()
            .unwrap();
        assert_eq!(found.build_number, 2);

        let found = db
            .find_latest_build(42, Some("main"), "Dev", MilestoneMatch::Exact)
            .unwrap()
            .unwrap();
        assert_eq!(found.build_number, 3);

        assert!(db
            .find_latest_build(42, Some("release/1.0"), "Dev", MilestoneMatch::AtLeast)
            .unwrap()
            .is_none());
        assert!(matches!(
            db.find_latest_build(42, None, "Gold", MilestoneMatch::Exact),
            Err(BuildError::UnknownMilestone { .. })
        ));
    }
}
