//! Infrastructure layer
//!
//! Handles all I/O: the SQLite store, the change-management HTTP client, and
//! platform directories. This module is the only place where side effects occur.

pub mod db;
pub mod dirs;
pub mod notifier;
