//! Core business logic module
//!
//! This module contains all business logic for radar.
//! It has NO I/O operations - those belong in [`crate::infra`]. Persistence
//! and notification are reached through the traits declared here.
//!
//! # Submodules
//!
//! - [`milestone`] - Milestone catalog and progression rule
//! - [`history`] - Append-only transition ledger
//! - [`transition`] - Milestone state machine and its store/notifier seams
//! - [`build`] - Build records, steps and search
//! - [`bom`] - Bill of materials and dependency edges
//! - [`graph`] - Dependency provenance graph and table assembly
//! - [`quality_gate`] - Versioned quality gates
//! - [`global_config`] - Global configuration management

pub mod bom;
pub mod build;
pub mod global_config;
pub mod graph;
pub mod history;
pub mod milestone;
pub mod quality_gate;
pub mod transition;
