//! Quality gate versioning
//!
//! A gate is never edited in place. Updating one retires every row stored
//! under its name and inserts a fresh active row, so a historical build can
//! still show which thresholds were in force when it ran.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{QualityGateError, StoreError};

/// Quality gate row identity
pub type GateId = i64;

/// A stored quality gate row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityGate {
    pub id: GateId,
    pub name: String,
    pub description: String,
    pub gate_type: String,
    pub pass: i64,
    pub fail: i64,
    pub min: i64,
    pub max: i64,
    pub active: bool,
}

/// Values supplied when creating or updating a gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateFields {
    pub name: String,
    pub description: String,
    pub gate_type: String,
    pub pass: i64,
    pub fail: i64,
    pub min: i64,
    pub max: i64,
}

impl GateFields {
    /// Check that the thresholds describe a usable range
    pub fn validate(&self) -> Result<(), QualityGateError> {
        let invalid = |message: String| QualityGateError::InvalidThresholds {
            name: self.name.clone(),
            message,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name cannot be empty".to_string()));
        }
        if self.min > self.max {
            return Err(invalid(format!("min {} is greater than max {}", self.min, self.max)));
        }
        for (label, value) in [("pass", self.pass), ("fail", self.fail)] {
            if !(self.min..=self.max).contains(&value) {
                return Err(invalid(format!(
                    "{label} {value} is outside {}..={}",
                    self.min, self.max
                )));
            }
        }
        Ok(())
    }
}

/// Whether a write introduces a gate or replaces one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateChange {
    Create,
    Update,
}

/// Persistence the gate rules need
///
/// Each method is one atomic unit against the store.
pub trait QualityGateStore {
    /// Insert an active row unless one is already active under the name
    /// (case-insensitive). Returns `None` when an active row exists.
    fn create_gate(&self, fields: &GateFields) -> Result<Option<GateId>, StoreError>;

    /// Deactivate every row under the name and insert a new active one.
    /// Returns `None` when no row exists under the name.
    fn supersede_gate(&self, fields: &GateFields) -> Result<Option<GateId>, StoreError>;

    /// Every stored row, active or not
    fn all_gates(&self) -> Result<Vec<QualityGate>, StoreError>;

    /// Every row stored under a name (case-insensitive)
    fn gates_named(&self, name: &str) -> Result<Vec<QualityGate>, StoreError>;
}

/// Create or update a gate, returning the id of the new active row
pub fn upsert_quality_gate<S: QualityGateStore>(
    store: &S,
    change: GateChange,
    fields: &GateFields,
) -> Result<GateId, QualityGateError> {
    fields.validate()?;

    match change {
        GateChange::Create => {
            let id = store
                .create_gate(fields)?
                .ok_or_else(|| QualityGateError::DuplicateActiveGate {
                    name: fields.name.clone(),
                })?;
            info!("Created quality gate '{}' (row {})", fields.name, id);
            Ok(id)
        }
        GateChange::Update => {
            let id = store
                .supersede_gate(fields)?
                .ok_or_else(|| QualityGateError::NotFound {
                    name: fields.name.clone(),
                })?;
            info!("Superseded quality gate '{}' with row {}", fields.name, id);
            Ok(id)
        }
    }
}

/// Keep the highest-id row per case-insensitive name, ordered by name
///
/// Identities come from an autoincrement column and are never reused, so the
/// highest id is the most recently inserted row.
pub fn latest_per_name(rows: Vec<QualityGate>) -> Vec<QualityGate> {
    let mut latest: HashMap<String, QualityGate> = HashMap::new();
    for row in rows {
        let key = row.name.to_ascii_lowercase();
        match latest.get(&key) {
            Some(existing) if existing.id >= row.id => {}
            _ => {
                latest.insert(key, row);
            }
        }
    }

    let mut gates: Vec<QualityGate> = latest.into_values().collect();
    gates.sort_by(|a, b| a.name.to_ascii_lowercase().cmp(&b.name.to_ascii_lowercase()));
    gates
}

/// The current configuration of every gate
pub fn list_active_quality_gates<S: QualityGateStore>(
    store: &S,
) -> Result<Vec<QualityGate>, QualityGateError> {
    let gates = latest_per_name(store.all_gates()?);
    debug!("Listing {} quality gates", gates.len());
    Ok(gates)
}

/// Every stored version of a gate, oldest first
pub fn gate_history<S: QualityGateStore>(
    store: &S,
    name: &str,
) -> Result<Vec<QualityGate>, QualityGateError> {
    let mut rows = store.gates_named(name)?;
    if rows.is_empty() {
        return Err(QualityGateError::NotFound {
            name: name.to_string(),
        });
    }
    rows.sort_by_key(|g| g.id);
    Ok(rows)
}
