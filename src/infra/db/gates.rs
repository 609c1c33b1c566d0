//! Quality gate storage

use rusqlite::{params, Connection, Row, TransactionBehavior};
use tracing::debug;

use super::Database;
use crate::core::quality_gate::{GateFields, GateId, QualityGate, QualityGateStore};
use crate::error::StoreError;

const GATE_COLUMNS: &str = "id, name, description, gate_type, pass, fail, min, max, active";

fn gate_from_row(row: &Row<'_>) -> rusqlite::Result<QualityGate> {
    Ok(QualityGate {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        gate_type: row.get(3)?,
        pass: row.get(4)?,
        fail: row.get(5)?,
        min: row.get(6)?,
        max: row.get(7)?,
        active: row.get(8)?,
    })
}

fn count_rows(conn: &Connection, name: &str, active_only: bool) -> Result<i64, StoreError> {
    conn.query_row(
        "SELECT COUNT(*) FROM quality_gates WHERE name = ?1 AND (?2 = 0 OR active = 1)",
        params![name, active_only],
        |row| row.get(0),
    )
    .map_err(StoreError::query("count quality gates"))
}

fn insert_active(conn: &Connection, fields: &GateFields) -> Result<GateId, StoreError> {
    conn.execute(
        "INSERT INTO quality_gates (name, description, gate_type, pass, fail, min, max, active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1)",
        params![
            fields.name,
            fields.description,
            fields.gate_type,
            fields.pass,
            fields.fail,
            fields.min,
            fields.max
        ],
    )
    .map_err(StoreError::query("insert quality gate"))?;
    Ok(conn.last_insert_rowid())
}

fn select_gates(conn: &Connection, filter: Option<&str>) -> Result<Vec<QualityGate>, StoreError> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {GATE_COLUMNS} FROM quality_gates WHERE ?1 IS NULL OR name = ?1 ORDER BY id"
        ))
        .map_err(StoreError::query("list quality gates"))?;
    let gates = stmt
        .query_map(params![filter], gate_from_row)
        .map_err(StoreError::query("list quality gates"))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::query("list quality gates"))?;
    Ok(gates)
}

impl QualityGateStore for Database {
    fn create_gate(&self, fields: &GateFields) -> Result<Option<GateId>, StoreError> {
        self.with_conn_mut(|conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(StoreError::query("begin create gate"))?;
            if count_rows(&tx, &fields.name, true)? > 0 {
                return Ok(None);
            }
            let id = insert_active(&tx, fields)?;
            tx.commit().map_err(StoreError::query("commit create gate"))?;
            Ok(Some(id))
        })
    }

    fn supersede_gate(&self, fields: &GateFields) -> Result<Option<GateId>, StoreError> {
        self.with_conn_mut(|conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(StoreError::query("begin update gate"))?;
            if count_rows(&tx, &fields.name, false)? == 0 {
                return Ok(None);
            }

            let retired = tx
                .execute(
                    "UPDATE quality_gates SET active = 0 WHERE name = ?1",
                    params![fields.name],
                )
                .map_err(StoreError::query("deactivate quality gates"))?;
            let id = insert_active(&tx, fields)?;
            tx.commit().map_err(StoreError::query("commit update gate"))?;

            debug!("Retired {} rows of quality gate '{}'", retired, fields.name);
            Ok(Some(id))
        })
    }

    fn all_gates(&self) -> Result<Vec<QualityGate>, StoreError> {
        self.with_conn(|conn| select_gates(conn, None))
    }

    fn gates_named(&self, name: &str) -> Result<Vec<QualityGate>, StoreError> {
        self.with_conn(|conn| select_gates(conn, Some(name)))
    }
}
