//! Radar - build milestone tracking and dependency provenance
//!
//! Records builds of software components, moves them through ordered
//! release milestones with an audit trail, captures each build's bill of
//! materials, and assembles the dependency graph behind any build.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Business logic (no I/O operations)
//! - [`infra`] - Infrastructure layer (SQLite store, HTTP notifier, directories)
//! - [`config`] - Configuration and constants
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;

#[cfg(test)]
pub mod test_utils;
