//! Bill of materials and dependency storage

use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use tracing::{debug, info};

use super::builds::build_exists;
use super::{is_constraint_violation, Database};
use crate::core::bom::{
    ensure_editable, ensure_lockable, Bom, BomDetails, CodeExport, DependencyEdge, DependencyKind,
    EcmDependency, ExternalPackage, NewBom, OrbitDependency, ScmCoordinates,
};
use crate::core::build::BuildRecordId;
use crate::core::graph::{BuildSummary, DependencySource};
use crate::error::{BomError, StoreError};

fn bom_from_row(row: &Row<'_>) -> rusqlite::Result<Bom> {
    Ok(Bom {
        id: row.get(0)?,
        build_record_id: row.get(1)?,
        bom_type: row.get(2)?,
        build_system: row.get(3)?,
        build_system_version: row.get(4)?,
        antivirus_dat_version: row.get(5)?,
        ecm_mock_master_record_id: row.get(6)?,
        locked: row.get(7)?,
    })
}

fn get_bom(conn: &Connection, build_record_id: BuildRecordId) -> Result<Option<Bom>, StoreError> {
    conn.query_row(
        "SELECT id, build_record_id, bom_type, build_system, build_system_version,
                antivirus_dat_version, ecm_mock_master_record_id, locked
         FROM boms WHERE build_record_id = ?1",
        params![build_record_id],
        bom_from_row,
    )
    .optional()
    .map_err(StoreError::query("get bom"))
}

fn orbit_dependencies(conn: &Connection, build_record_id: BuildRecordId) -> Result<Vec<OrbitDependency>, StoreError> {
    let mut stmt = conn
        .prepare(
            "SELECT build_record_id, bom_type, dependency_build_record_id, scm_order
             FROM orbit_dependencies WHERE build_record_id = ?1 ORDER BY scm_order",
        )
        .map_err(StoreError::query("list orbit dependencies"))?;
    let rows = stmt
        .query_map(params![build_record_id], |row| {
            Ok(OrbitDependency {
                build_record_id: row.get(0)?,
                bom_type: row.get(1)?,
                dependency_build_record_id: row.get(2)?,
                scm_order: row.get(3)?,
            })
        })
        .map_err(StoreError::query("list orbit dependencies"))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::query("list orbit dependencies"))?;
    Ok(rows)
}

fn ecm_dependencies(conn: &Connection, build_record_id: BuildRecordId) -> Result<Vec<EcmDependency>, StoreError> {
    let mut stmt = conn
        .prepare(
            "SELECT build_record_id, bom_type, ecm_master_id, project_name, version,
                    build_number, package_number, scm_order
             FROM ecm_dependencies WHERE build_record_id = ?1 ORDER BY scm_order",
        )
        .map_err(StoreError::query("list ecm dependencies"))?;
    let rows = stmt
        .query_map(params![build_record_id], |row| {
            Ok(EcmDependency {
                build_record_id: row.get(0)?,
                bom_type: row.get(1)?,
                package: ExternalPackage {
                    master_id: row.get(2)?,
                    project_name: row.get(3)?,
                    version: row.get(4)?,
                    build_number: row.get(5)?,
                    package_number: row.get(6)?,
                },
                scm_order: row.get(7)?,
            })
        })
        .map_err(StoreError::query("list ecm dependencies"))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::query("list ecm dependencies"))?;
    Ok(rows)
}

fn code_exports(conn: &Connection, build_record_id: BuildRecordId) -> Result<Vec<CodeExport>, StoreError> {
    let mut stmt = conn
        .prepare(
            "SELECT build_record_id, bom_type, scm_type, scm_version, scm_protocol, scm_server,
                    scm_path, scm_tag, scm_commit, scm_order
             FROM code_exports WHERE build_record_id = ?1 ORDER BY scm_order",
        )
        .map_err(StoreError::query("list code exports"))?;
    let rows = stmt
        .query_map(params![build_record_id], |row| {
            Ok(CodeExport {
                build_record_id: row.get(0)?,
                bom_type: row.get(1)?,
                scm: ScmCoordinates {
                    scm_type: row.get(2)?,
                    scm_version: row.get(3)?,
                    scm_protocol: row.get(4)?,
                    scm_server: row.get(5)?,
                    scm_path: row.get(6)?,
                    scm_tag: row.get(7)?,
                    scm_commit: row.get(8)?,
                },
                scm_order: row.get(9)?,
            })
        })
        .map_err(StoreError::query("list code exports"))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::query("list code exports"))?;
    Ok(rows)
}

fn agents(conn: &Connection, build_record_id: BuildRecordId) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn
        .prepare("SELECT agent_name FROM build_agents WHERE build_record_id = ?1 ORDER BY id")
        .map_err(StoreError::query("list build agents"))?;
    let rows = stmt
        .query_map(params![build_record_id], |row| row.get(0))
        .map_err(StoreError::query("list build agents"))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::query("list build agents"))?;
    Ok(rows)
}

impl Database {
    /// Create the BOM for a build; a build gets at most one
    pub fn create_bom(&self, input: &NewBom) -> Result<Bom, BomError> {
        let build_record_id = input.build_record_id;
        self.with_conn_mut(|conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(StoreError::query("begin create bom"))?;

            if !build_exists(&tx, build_record_id)? {
                return Err(BomError::BuildNotFound { build_record_id });
            }
            if get_bom(&tx, build_record_id)?.is_some() {
                return Err(BomError::AlreadyExists { build_record_id });
            }

            tx.execute(
                "INSERT INTO boms (build_record_id, bom_type, build_system, build_system_version)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    build_record_id,
                    input.bom_type,
                    input.build_system,
                    input.build_system_version
                ],
            )
            .map_err(StoreError::query("insert bom"))?;
            let bom = get_bom(&tx, build_record_id)?.ok_or(BomError::NotFound { build_record_id })?;
            tx.commit().map_err(StoreError::query("commit create bom"))?;

            info!("Created {} BOM for build record {}", bom.bom_type, build_record_id);
            Ok(bom)
        })
    }

    /// The BOM of a build, if one was created
    pub fn find_bom(&self, build_record_id: BuildRecordId) -> Result<Option<Bom>, StoreError> {
        self.with_conn(|conn| get_bom(conn, build_record_id))
    }

    /// Run a mutation against an existing, unlocked BOM in one transaction
    fn with_editable_bom<F, T>(&self, build_record_id: BuildRecordId, f: F) -> Result<T, BomError>
    where
        F: FnOnce(&Transaction<'_>, &Bom) -> Result<T, BomError>,
    {
        self.with_conn_mut(|conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(StoreError::query("begin bom update"))?;
            let bom = ensure_editable(get_bom(&tx, build_record_id)?, build_record_id)?;
            let value = f(&tx, &bom)?;
            tx.commit().map_err(StoreError::query("commit bom update"))?;
            Ok(value)
        })
    }

    /// Record the antivirus definitions version the build was scanned with
    pub fn set_antivirus_dat_version(&self, build_record_id: BuildRecordId, version: &str) -> Result<(), BomError> {
        self.with_editable_bom(build_record_id, |tx, _| {
            tx.execute(
                "UPDATE boms SET antivirus_dat_version = ?1 WHERE build_record_id = ?2",
                params![version, build_record_id],
            )
            .map_err(StoreError::query("set antivirus version"))?;
            info!("BOM {}: antivirus DAT version {}", build_record_id, version);
            Ok(())
        })
    }

    /// Record the build's change-management mock record id
    pub fn set_ecm_mock_master_record(&self, build_record_id: BuildRecordId, record_id: &str) -> Result<(), BomError> {
        self.with_editable_bom(build_record_id, |tx, _| {
            tx.execute(
                "UPDATE boms SET ecm_mock_master_record_id = ?1 WHERE build_record_id = ?2",
                params![record_id, build_record_id],
            )
            .map_err(StoreError::query("set ecm mock record"))?;
            info!("BOM {}: change-management record {}", build_record_id, record_id);
            Ok(())
        })
    }

    /// Add a build agent to the BOM
    pub fn add_build_agent(&self, build_record_id: BuildRecordId, agent_name: &str) -> Result<(), BomError> {
        self.with_editable_bom(build_record_id, |tx, _| {
            tx.execute(
                "INSERT INTO build_agents (build_record_id, agent_name) VALUES (?1, ?2)",
                params![build_record_id, agent_name],
            )
            .map_err(StoreError::query("insert build agent"))?;
            debug!("BOM {}: agent {}", build_record_id, agent_name);
            Ok(())
        })
    }

    /// Add a code export at an ordering position
    pub fn add_code_export(
        &self,
        build_record_id: BuildRecordId,
        scm: &ScmCoordinates,
        scm_order: i64,
    ) -> Result<CodeExport, BomError> {
        self.with_editable_bom(build_record_id, |tx, bom| {
            tx.execute(
                "INSERT INTO code_exports (build_record_id, bom_type, scm_type, scm_version,
                    scm_protocol, scm_server, scm_path, scm_tag, scm_commit, scm_order)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    build_record_id,
                    bom.bom_type,
                    scm.scm_type,
                    scm.scm_version,
                    scm.scm_protocol,
                    scm.scm_server,
                    scm.scm_path,
                    scm.scm_tag,
                    scm.scm_commit,
                    scm_order
                ],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    BomError::DuplicateExportOrder {
                        build_record_id,
                        scm_order,
                    }
                } else {
                    StoreError::query("insert code export")(e).into()
                }
            })?;
            info!("BOM {}: code export {} at order {}", build_record_id, scm.scm_path, scm_order);

            Ok(CodeExport {
                build_record_id,
                bom_type: bom.bom_type.clone(),
                scm: scm.clone(),
                scm_order,
            })
        })
    }

    /// Record that a build incorporates another build
    pub fn add_orbit_dependency(
        &self,
        build_record_id: BuildRecordId,
        dependency_build_record_id: BuildRecordId,
        scm_order: i64,
    ) -> Result<OrbitDependency, BomError> {
        if build_record_id == dependency_build_record_id {
            return Err(BomError::SelfDependency { build_record_id });
        }

        self.with_editable_bom(build_record_id, |tx, bom| {
            if !build_exists(tx, dependency_build_record_id)? {
                return Err(BomError::DependencyTargetNotFound {
                    dependency_build_record_id,
                });
            }

            tx.execute(
                "INSERT INTO orbit_dependencies (build_record_id, bom_type, dependency_build_record_id, scm_order)
                 VALUES (?1, ?2, ?3, ?4)",
                params![build_record_id, bom.bom_type, dependency_build_record_id, scm_order],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    BomError::DuplicateOrderKey {
                        build_record_id,
                        kind: DependencyKind::Internal,
                        scm_order,
                    }
                } else {
                    StoreError::query("insert orbit dependency")(e).into()
                }
            })?;
            info!(
                "BOM {}: depends on build {} at order {}",
                build_record_id, dependency_build_record_id, scm_order
            );

            Ok(OrbitDependency {
                build_record_id,
                bom_type: bom.bom_type.clone(),
                dependency_build_record_id,
                scm_order,
            })
        })
    }

    /// Record that a build incorporates an external package
    pub fn add_ecm_dependency(
        &self,
        build_record_id: BuildRecordId,
        package: &ExternalPackage,
        scm_order: i64,
    ) -> Result<EcmDependency, BomError> {
        self.with_editable_bom(build_record_id, |tx, bom| {
            tx.execute(
                "INSERT INTO ecm_dependencies (build_record_id, bom_type, ecm_master_id, project_name,
                    version, build_number, package_number, scm_order)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    build_record_id,
                    bom.bom_type,
                    package.master_id,
                    package.project_name,
                    package.version,
                    package.build_number,
                    package.package_number,
                    scm_order
                ],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    BomError::DuplicateOrderKey {
                        build_record_id,
                        kind: DependencyKind::External,
                        scm_order,
                    }
                } else {
                    StoreError::query("insert ecm dependency")(e).into()
                }
            })?;
            info!("BOM {}: depends on {} at order {}", build_record_id, package, scm_order);

            Ok(EcmDependency {
                build_record_id,
                bom_type: bom.bom_type.clone(),
                package: package.clone(),
                scm_order,
            })
        })
    }

    /// Lock the BOM against further additions
    pub fn lock_bom(&self, build_record_id: BuildRecordId) -> Result<(), BomError> {
        self.with_conn_mut(|conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(StoreError::query("begin lock bom"))?;
            ensure_lockable(get_bom(&tx, build_record_id)?, build_record_id)?;
            tx.execute(
                "UPDATE boms SET locked = 1 WHERE build_record_id = ?1",
                params![build_record_id],
            )
            .map_err(StoreError::query("lock bom"))?;
            tx.commit().map_err(StoreError::query("commit lock bom"))?;
            info!("Locked BOM for build record {}", build_record_id);
            Ok(())
        })
    }

    /// The BOM with every child row
    pub fn bom_details(&self, build_record_id: BuildRecordId) -> Result<BomDetails, BomError> {
        self.with_conn(|conn| {
            let bom = get_bom(conn, build_record_id)?.ok_or(BomError::NotFound { build_record_id })?;
            Ok(BomDetails {
                bom,
                agents: agents(conn, build_record_id)?,
                code_exports: code_exports(conn, build_record_id)?,
                orbit_dependencies: orbit_dependencies(conn, build_record_id)?,
                ecm_dependencies: ecm_dependencies(conn, build_record_id)?,
            })
        })
    }
}

impl DependencySource for Database {
    fn build_summary(&self, id: BuildRecordId) -> Result<Option<BuildSummary>, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT b.id, b.component_id, b.build_number, b.branch, m.name
                 FROM build_records b JOIN milestones m ON m.id = b.milestone_id
                 WHERE b.id = ?1",
                params![id],
                |row| {
                    Ok(BuildSummary {
                        id: row.get(0)?,
                        component_id: row.get(1)?,
                        build_number: row.get(2)?,
                        branch: row.get(3)?,
                        milestone: row.get(4)?,
                    })
                },
            )
            .optional()
            .map_err(StoreError::query("get build summary"))
        })
    }

    fn dependency_edges(&self, id: BuildRecordId) -> Result<Vec<DependencyEdge>, StoreError> {
        self.with_conn(|conn| {
            let mut edges: Vec<DependencyEdge> = orbit_dependencies(conn, id)?
                .into_iter()
                .map(DependencyEdge::Internal)
                .collect();
            edges.extend(ecm_dependencies(conn, id)?.into_iter().map(DependencyEdge::External));
            Ok(edges)
        })
    }
}
