//! CLI type definitions.
//!
//! This module contains clap command structures that define the `aclo`
//! interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "aclo")]
#[command(about = "Autonomous Close-Loop Orchestrator", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root (the directory that holds `auto/`, `specs/`, `reports/`)
    #[arg(long, global = true, default_value = ".")]
    pub workspace: PathBuf,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// External spec-builder command to invoke for `runAutoCloseLoop`
    #[arg(long, global = true, default_value = "aclo-spec-builder")]
    pub spec_builder_cmd: String,

    /// Arguments passed to the spec-builder command, in order
    #[arg(long, global = true, value_delimiter = ',')]
    pub spec_builder_arg: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full decompose/schedule/retry/recover/gate chain for one goal
    Run {
        /// The goal text to decompose and execute
        goal: String,

        /// Target sub-goal count (2-12); omit for the heuristic default
        #[arg(long)]
        target_sub_goal_count: Option<u8>,

        /// Minimum decomposition quality score to accept
        #[arg(long)]
        quality_threshold: Option<u8>,

        /// Gate profile: default, dev, staging, prod
        #[arg(long, default_value = "default")]
        gate_profile: String,

        /// Enable the iterative governance loop on top of the run
        #[arg(long)]
        governance: bool,

        /// Plan-only: build scheduling plans without invoking the spec builder
        #[arg(long)]
        dry_run: bool,

        /// Override the command used by the "run strict quality gates" recovery action
        #[arg(long)]
        dod_tests_command: Option<String>,
    },

    /// Goal queue inspection and maintenance
    #[command(subcommand)]
    Queue(QueueCommands),

    /// Run the long-running queue-draining controller
    #[command(subcommand)]
    Controller(ControllerCommands),

    /// Session archive statistics and pruning
    #[command(subcommand)]
    Archive(ArchiveCommands),

    /// Evidence and KPI trend reporting
    #[command(subcommand)]
    Evidence(EvidenceCommands),

    /// Show the effective layered configuration
    Config,
}

#[derive(Subcommand)]
pub enum QueueCommands {
    /// Load the queue without dequeuing
    Load {
        /// Drop duplicate goals by fingerprint, first occurrence wins
        #[arg(long)]
        dedupe: bool,
    },
    /// Dequeue goals under the advisory lease lock
    Dequeue {
        /// Drop duplicate goals by fingerprint before dequeuing
        #[arg(long)]
        dedupe: bool,
        /// Maximum number of goals to dequeue; omit for all pending
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Subcommand)]
pub enum ControllerCommands {
    /// Drain the queue, one full program run per goal, until a stop condition fires
    Run {
        #[arg(long)]
        max_cycles: Option<u32>,
        #[arg(long)]
        max_minutes: Option<u32>,
        #[arg(long)]
        poll_seconds: Option<u64>,
        #[arg(long)]
        dequeue_limit: Option<usize>,
        /// Sleep and re-poll instead of stopping when the queue is empty
        #[arg(long)]
        wait_on_empty: bool,
        /// Stop the drain as soon as any goal in a cycle fails
        #[arg(long)]
        stop_on_goal_failure: bool,
        /// Append a tab-delimited audit line per goal to this path
        #[arg(long)]
        log_path: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ArchiveCommands {
    /// Per-status counts over one archive directory
    Stats {
        /// close-loop, batch, controller, governance
        kind: String,
        #[arg(long)]
        window_days: Option<i64>,
        #[arg(long)]
        status: Option<String>,
    },
    /// Retention prune of one archive directory
    Prune {
        kind: String,
        #[arg(long, default_value = "50")]
        keep: usize,
        #[arg(long, default_value = "90")]
        older_than_days: i64,
        #[arg(long)]
        current_file: Option<String>,
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
pub enum EvidenceCommands {
    /// Bucketed completion/failure trend over the batch and controller archives
    Trend {
        /// week or day
        #[arg(long, default_value = "week")]
        period: String,
        #[arg(long, default_value = "84")]
        window_days: i64,
        /// all, batch, program, recover, controller
        #[arg(long, default_value = "all")]
        mode: String,
    },
}
