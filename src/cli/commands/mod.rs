//! CLI command implementations
//!
//! Each command group lives in its own submodule. Commands open the store,
//! call into [`crate::core`] and [`crate::infra`], and format the result.

pub mod bom;
pub mod build;
pub mod gate;
pub mod init;
pub mod milestone;

use std::path::Path;

use anyhow::Result;
use clap::Subcommand;
use tracing::debug;

use crate::config::defaults::DEFAULT_ACTOR;
use crate::core::global_config::GlobalConfig;
use crate::infra::db::Database;
use crate::infra::dirs::RadarDirs;

/// Configuration and store shared by every command
pub struct Context {
    pub config: GlobalConfig,
    pub db: Database,
}

impl Context {
    /// Load the global config and open the database it points at
    pub fn open(db_override: Option<&Path>) -> Result<Self> {
        let dirs = RadarDirs::new();
        let config = GlobalConfig::load(&dirs)?;
        let path = config.db_path(&dirs, db_override);
        debug!("Using database {}", path.display());
        let db = Database::open(&path)?;
        Ok(Self { config, db })
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database and optionally seed default milestones
    Init {
        /// Insert the default milestone set (Dev, QA, Staging, Release)
        #[arg(long)]
        seed: bool,
    },

    /// Milestone catalog and build progression
    Milestone {
        #[command(subcommand)]
        command: MilestoneCommands,
    },

    /// Build records
    Build {
        #[command(subcommand)]
        command: BuildCommands,
    },

    /// Bills of materials and dependency provenance
    Bom {
        #[command(subcommand)]
        command: BomCommands,
    },

    /// Quality gates
    Gate {
        #[command(subcommand)]
        command: GateCommands,
    },
}

/// Milestone subcommands
#[derive(Subcommand, Debug)]
pub enum MilestoneCommands {
    /// List milestones in progression order
    List {
        /// Only show milestones builds can progress to
        #[arg(long)]
        active: bool,
    },

    /// Define a new milestone
    Define {
        /// Milestone name (unique, case-insensitive)
        name: String,

        /// Ordinal level; higher is further along
        #[arg(long, allow_negative_numbers = true)]
        level: i64,

        /// Create the milestone inactive
        #[arg(long)]
        inactive: bool,
    },

    /// Allow builds to progress to a milestone
    Activate {
        /// Milestone name
        name: String,
    },

    /// Stop builds from progressing to a milestone
    Deactivate {
        /// Milestone name
        name: String,
    },

    /// Move a build to a milestone
    Progress {
        /// Build record ID
        build: i64,

        /// Target milestone name
        milestone: String,

        /// Free-form comment recorded with the transition
        #[arg(long)]
        comment: Option<String>,

        /// Who is making the change
        #[arg(long, env = "RADAR_ACTOR", default_value = DEFAULT_ACTOR)]
        actor: String,
    },

    /// Show a build's milestone history
    History {
        /// Build record ID
        build: i64,
    },

    /// List milestones a build may move to
    Progressions {
        /// Build record ID
        build: i64,
    },

    /// Show the milestone a build is on
    Current {
        /// Build record ID
        build: i64,
    },
}

/// Build record subcommands
#[derive(Subcommand, Debug)]
pub enum BuildCommands {
    /// Register a build
    Create {
        /// Component ID
        #[arg(long)]
        component: i64,

        /// Build number
        #[arg(long)]
        number: i64,

        /// Source branch
        #[arg(long)]
        branch: String,

        /// Starting milestone (defaults to the lowest active milestone)
        #[arg(long)]
        milestone: Option<String>,
    },

    /// Show a build record and its steps
    Show {
        /// Build record ID
        build: i64,
    },

    /// Record the result of a named build step
    Step {
        /// Build record ID
        build: i64,

        /// Step name
        name: String,

        /// Step result
        result: String,
    },

    /// Record the final build result
    Result {
        /// Build record ID
        build: i64,

        /// Final result
        result: String,

        /// Comment on the result
        #[arg(long)]
        comment: Option<String>,
    },

    /// Record where the build artifacts live
    Artifacts {
        /// Build record ID
        build: i64,

        /// Artifact location
        url: String,
    },

    /// Record code coverage (0-100)
    Coverage {
        /// Build record ID
        build: i64,

        /// Coverage percentage
        percent: f64,
    },

    /// Find the latest build of a component at a milestone
    Search {
        /// Component ID
        #[arg(long)]
        component: i64,

        /// Milestone name
        #[arg(long)]
        milestone: String,

        /// Restrict to a branch
        #[arg(long)]
        branch: Option<String>,

        /// Only match builds on exactly this milestone
        #[arg(long)]
        exact: bool,
    },
}

/// BOM subcommands
#[derive(Subcommand, Debug)]
pub enum BomCommands {
    /// Create the BOM for a build
    Create {
        /// Build record ID
        build: i64,

        /// BOM type
        #[arg(long = "type", value_name = "TYPE")]
        bom_type: String,

        /// Build system name
        #[arg(long)]
        build_system: String,

        /// Build system version
        #[arg(long)]
        build_system_version: String,
    },

    /// Show a BOM and everything recorded on it
    Show {
        /// Build record ID
        build: i64,
    },

    /// Lock a BOM against further edits
    Lock {
        /// Build record ID
        build: i64,
    },

    /// Set the antivirus DAT version
    Antivirus {
        /// Build record ID
        build: i64,

        /// DAT version
        #[arg(value_name = "VERSION")]
        dat_version: String,
    },

    /// Set the change-management record notified on milestone changes
    EcmRecord {
        /// Build record ID
        build: i64,

        /// Change-management record ID
        record: String,
    },

    /// Add a build agent
    Agent {
        /// Build record ID
        build: i64,

        /// Agent name
        name: String,
    },

    /// Add a code export
    Export {
        /// Build record ID
        build: i64,

        /// Ordering key
        #[arg(long)]
        order: i64,

        /// SCM type (git, svn, ...)
        #[arg(long)]
        scm_type: String,

        /// SCM client version
        #[arg(long)]
        scm_version: String,

        /// Access protocol
        #[arg(long)]
        protocol: String,

        /// SCM server
        #[arg(long)]
        server: String,

        /// Repository path
        #[arg(long)]
        path: String,

        /// Tag
        #[arg(long)]
        tag: Option<String>,

        /// Commit
        #[arg(long)]
        commit: Option<String>,
    },

    /// Add an internal (Orbit) dependency on another build
    Orbit {
        /// Build record ID
        build: i64,

        /// Build record the build depends on
        dependency: i64,

        /// Ordering key
        #[arg(long)]
        order: i64,
    },

    /// Add an external (ECM) package dependency
    Ecm {
        /// Build record ID
        build: i64,

        /// Ordering key
        #[arg(long)]
        order: i64,

        /// Package master ID
        #[arg(long)]
        master_id: String,

        /// Project name
        #[arg(long)]
        project: String,

        /// Package version
        #[arg(long = "pkg-version", value_name = "VERSION")]
        pkg_version: String,

        /// Package build number
        #[arg(long)]
        build_number: i64,

        /// Package number
        #[arg(long)]
        package_number: String,
    },

    /// Show the dependency graph of a build
    Graph {
        /// Build record ID
        build: i64,

        /// Emit Graphviz DOT instead of a text tree
        #[arg(long)]
        dot: bool,

        /// Maximum traversal depth
        #[arg(long)]
        max_depth: Option<usize>,
    },

    /// Show the flattened dependency table of a build
    Table {
        /// Build record ID
        build: i64,

        /// Maximum traversal depth
        #[arg(long)]
        max_depth: Option<usize>,
    },
}

/// Quality gate subcommands
#[derive(Subcommand, Debug)]
pub enum GateCommands {
    /// Create a quality gate
    Create(gate::GateArgs),

    /// Publish a new version of a quality gate
    Update(gate::GateArgs),

    /// List the current version of every gate
    List,

    /// Show every version of a gate
    History {
        /// Gate name
        name: String,
    },
}

impl Commands {
    /// Execute the command
    pub async fn run(self, db_override: Option<&Path>) -> Result<()> {
        let ctx = Context::open(db_override)?;
        match self {
            Self::Init { seed } => init::execute(&ctx, seed).await,
            Self::Milestone { command } => match command {
                MilestoneCommands::List { active } => milestone::execute_list(&ctx, active).await,
                MilestoneCommands::Define {
                    name,
                    level,
                    inactive,
                } => milestone::execute_define(&ctx, &name, level, !inactive).await,
                MilestoneCommands::Activate { name } => {
                    milestone::execute_set_active(&ctx, &name, true).await
                }
                MilestoneCommands::Deactivate { name } => {
                    milestone::execute_set_active(&ctx, &name, false).await
                }
                MilestoneCommands::Progress {
                    build,
                    milestone: target,
                    comment,
                    actor,
                } => milestone::execute_progress(&ctx, build, &target, &actor, comment).await,
                MilestoneCommands::History { build } => milestone::execute_history(&ctx, build).await,
                MilestoneCommands::Progressions { build } => {
                    milestone::execute_progressions(&ctx, build).await
                }
                MilestoneCommands::Current { build } => milestone::execute_current(&ctx, build).await,
            },
            Self::Build { command } => match command {
                BuildCommands::Create {
                    component,
                    number,
                    branch,
                    milestone,
                } => build::execute_create(&ctx, component, number, branch, milestone).await,
                BuildCommands::Show { build: id } => build::execute_show(&ctx, id).await,
                BuildCommands::Step {
                    build: id,
                    name,
                    result,
                } => build::execute_step(&ctx, id, &name, &result).await,
                BuildCommands::Result {
                    build: id,
                    result,
                    comment,
                } => build::execute_result(&ctx, id, &result, comment.as_deref()).await,
                BuildCommands::Artifacts { build: id, url } => {
                    build::execute_artifacts(&ctx, id, &url).await
                }
                BuildCommands::Coverage { build: id, percent } => {
                    build::execute_coverage(&ctx, id, percent).await
                }
                BuildCommands::Search {
                    component,
                    milestone,
                    branch,
                    exact,
                } => build::execute_search(&ctx, component, &milestone, branch.as_deref(), exact).await,
            },
            Self::Bom { command } => bom::execute(&ctx, command).await,
            Self::Gate { command } => match command {
                GateCommands::Create(args) => gate::execute_create(&ctx, args).await,
                GateCommands::Update(args) => gate::execute_update(&ctx, args).await,
                GateCommands::List => gate::execute_list(&ctx).await,
                GateCommands::History { name } => gate::execute_history(&ctx, &name).await,
            },
        }
    }
}
