//! `aclo` CLI entry point

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use aclo::cli::commands::{archive, config as config_cmd, controller, evidence, queue, run};
use aclo::cli::{ArchiveCommands, Cli, Commands, ControllerCommands, EvidenceCommands, QueueCommands};
use aclo::domain::ports::spec_builder::SpecBuilder;
use aclo::domain::ports::workspace::Workspace;
use aclo::infrastructure::config::ConfigLoader;
use aclo::infrastructure::logging::{LogConfig, LogFormat, LoggerImpl};
use aclo::infrastructure::spec_builder::ProcessSpecBuilder;
use aclo::services::goal_store::GoalStore;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let global = ConfigLoader::load(&cli.workspace).context("failed to load configuration")?;
    let workspace = Workspace::new(cli.workspace.clone());

    let log_config = LogConfig {
        level: global.logging.level.clone(),
        format: if global.logging.format == "pretty" { LogFormat::Pretty } else { LogFormat::Json },
        log_dir: Some(workspace.auto_dir().join("logs")),
        retention_days: i64::from(global.logging.retention_days),
        ..LogConfig::default()
    };
    let _logger = LoggerImpl::init(&log_config).context("failed to initialize logging")?;

    let spec_builder: Arc<dyn SpecBuilder> = Arc::new(ProcessSpecBuilder::new(cli.spec_builder_cmd.clone(), cli.spec_builder_arg.clone()));

    let succeeded = match cli.command {
        Commands::Run { goal, target_sub_goal_count, quality_threshold, gate_profile, governance, dry_run, dod_tests_command } => {
            run::handle_run(
                &workspace,
                goal,
                target_sub_goal_count,
                quality_threshold,
                &gate_profile,
                governance,
                dry_run,
                dod_tests_command,
                &global,
                spec_builder,
                cli.json,
            )
            .await?
        }
        Commands::Queue(queue_cmd) => {
            let store = GoalStore::new(workspace.auto_dir().join("close-loop-controller-goals.lines"), global.queue_lock_ttl_seconds);
            match queue_cmd {
                QueueCommands::Load { dedupe } => {
                    queue::handle_load(&store, dedupe, cli.json).await?;
                    true
                }
                QueueCommands::Dequeue { dedupe, limit } => {
                    queue::handle_dequeue(&store, dedupe, limit, cli.json).await?;
                    true
                }
            }
        }
        Commands::Controller(ControllerCommands::Run {
            max_cycles,
            max_minutes,
            poll_seconds,
            dequeue_limit,
            wait_on_empty,
            stop_on_goal_failure,
            log_path,
        }) => {
            controller::handle_run(
                &workspace,
                max_cycles,
                max_minutes,
                poll_seconds,
                dequeue_limit,
                wait_on_empty,
                stop_on_goal_failure,
                log_path,
                &global,
                spec_builder,
                cli.json,
            )
            .await?
        }
        Commands::Archive(archive_cmd) => {
            match archive_cmd {
                ArchiveCommands::Stats { kind, window_days, status } => {
                    archive::handle_stats(workspace.root(), &kind, window_days, status, cli.json).await?;
                }
                ArchiveCommands::Prune { kind, keep, older_than_days, current_file, dry_run } => {
                    archive::handle_prune(workspace.root(), &kind, keep, older_than_days, current_file, dry_run, cli.json).await?;
                }
            }
            true
        }
        Commands::Evidence(EvidenceCommands::Trend { period, window_days, mode }) => {
            evidence::handle_trend(workspace.root(), &period, window_days, &mode, cli.json).await?;
            true
        }
        Commands::Config => {
            config_cmd::handle_config(&global, cli.json);
            true
        }
    };

    Ok(if succeeded { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
