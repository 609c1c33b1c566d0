//! Output formatting
//!
//! Human-readable status lines, JSON output for scripting, and the error
//! reporter used at the process boundary.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::{error, warn};

use crate::error::{
    BomError, BuildError, ConfigError, MilestoneError, QualityGateError, RadarError, StoreError, TransitionError,
};

static QUIET: AtomicBool = AtomicBool::new(false);
static JSON: AtomicBool = AtomicBool::new(false);

/// Status symbols
pub mod status {
    pub const SUCCESS: &str = "✓";
    pub const ERROR: &str = "✗";
    pub const WARNING: &str = "⚠";
    pub const INFO: &str = "ℹ";
}

/// Output mode selected on the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputConfig {
    pub quiet: bool,
    pub json: bool,
    pub verbose: u8,
}

impl OutputConfig {
    pub fn new(quiet: bool, json: bool, verbose: u8) -> Self {
        Self { quiet, json, verbose }
    }

    /// Make this configuration visible to the print helpers
    pub fn apply_global(&self) {
        QUIET.store(self.quiet, Ordering::Relaxed);
        JSON.store(self.json, Ordering::Relaxed);
    }

    /// Log level implied by the verbosity count
    pub fn log_level(&self) -> tracing::Level {
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            _ => tracing::Level::DEBUG,
        }
    }
}

pub fn is_quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}

pub fn is_json() -> bool {
    JSON.load(Ordering::Relaxed)
}

/// Human output is suppressed in quiet and JSON modes
fn human_output() -> bool {
    !is_quiet() && !is_json()
}

pub fn print_success(message: &str) {
    if human_output() {
        println!("{} {message}", status::SUCCESS);
    }
}

pub fn print_info(message: &str) {
    if human_output() {
        println!("{} {message}", status::INFO);
    }
}

/// Warnings go to stderr and survive `--quiet`
pub fn print_warning(message: &str) {
    if !is_json() {
        eprintln!("{} {message}", status::WARNING);
    }
}

/// Indented detail line under a status line
pub fn print_detail(message: &str) {
    if human_output() {
        println!("  {message}");
    }
}

/// Print a block of preformatted text (tables, trees)
pub fn print_block(text: &str) {
    if human_output() {
        println!("{text}");
    }
}

/// Print a value as pretty JSON on stdout
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Whether an error is a persistence fault rather than a rejected request
fn is_fault(err: &anyhow::Error) -> bool {
    if let Some(e) = err.downcast_ref::<RadarError>() {
        return e.is_store_failure();
    }
    if let Some(e) = err.downcast_ref::<TransitionError>() {
        return e.is_store_failure();
    }
    if let Some(e) = err.downcast_ref::<MilestoneError>() {
        return e.is_store_failure();
    }
    if let Some(e) = err.downcast_ref::<BuildError>() {
        return e.is_store_failure();
    }
    if let Some(e) = err.downcast_ref::<BomError>() {
        return e.is_store_failure();
    }
    if let Some(e) = err.downcast_ref::<QualityGateError>() {
        return e.is_store_failure();
    }
    if err.downcast_ref::<ConfigError>().is_some() {
        return false;
    }
    if err.downcast_ref::<StoreError>().is_some() {
        return true;
    }
    // Anything unclassified (I/O, serialization) is unexpected
    true
}

/// Report a command failure
///
/// Rejected requests are logged at warn, store faults at error. The message
/// itself always reaches stderr, or stdout as JSON in `--json` mode.
pub fn display_error(err: &anyhow::Error) {
    if is_fault(err) {
        error!("{err:#}");
    } else {
        warn!("{err:#}");
    }

    if is_json() {
        let body = serde_json::json!({
            "status": "error",
            "message": format!("{err:#}"),
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {err:#}", status::ERROR);
    }
}
