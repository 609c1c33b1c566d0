//! Default configuration values

/// Database file name inside the data directory
pub const DEFAULT_DB_FILE: &str = "radar.db";

/// Config file name inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

/// How many dependency levels below a build the graph expands
pub const DEFAULT_GRAPH_MAX_DEPTH: usize = 16;

/// Change-management request timeout (in seconds)
pub const NOTIFY_TIMEOUT_SECS: u64 = 10;

/// Maximum number of change-management notification retries
pub const NOTIFY_MAX_RETRIES: u32 = 3;

/// Initial delay between notification retries (in milliseconds)
pub const NOTIFY_RETRY_DELAY_MS: u64 = 500;

/// Actor recorded when none is given
pub const DEFAULT_ACTOR: &str = "radar";

/// Milestones created by `radar init --seed` as (name, level)
pub const DEFAULT_MILESTONES: &[(&str, i64)] = &[("Dev", 0), ("QA", 10), ("Staging", 20), ("Release", 30)];

/// Minimum proptest iterations
pub const MIN_PROPTEST_ITERATIONS: u32 = 100;
