//! Process-backed adapter for the external spec-builder collaborator.
//!
//! `runAutoCloseLoop` — the system that synthesizes requirement, design, and
//! task documents from a goal — is explicitly out of scope. This adapter
//! invokes it as a configurable external command, the way the teacher's
//! overseer adapters (`services/overseers/*.rs`) shell out to `cargo`/`npm`:
//! the goal and per-goal options are passed as a JSON object on stdin, and
//! the command's stdout is parsed back into a [`SpecBuilderOutcome`].

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::domain::errors::{AcloError, AcloResult};
use crate::domain::models::RateLimitTelemetry;
use crate::domain::ports::spec_builder::{SpecBuilder, SpecBuilderOptions, SpecBuilderOutcome, SpecPortfolio, SubSpec};

#[derive(Debug, Deserialize)]
struct WireOrchestration {
    #[serde(default, rename = "rateLimit")]
    rate_limit: Option<WireRateLimit>,
}

#[derive(Debug, Deserialize)]
struct WireRateLimit {
    #[serde(default, rename = "signalCount")]
    signal_count: u32,
    #[serde(default, rename = "totalBackoffMs")]
    total_backoff_ms: u64,
    #[serde(default, rename = "lastLaunchHoldMs")]
    last_launch_hold_ms: u64,
}

#[derive(Debug, Deserialize)]
struct WireReplan {
    #[serde(default)]
    performed: bool,
}

#[derive(Debug, Deserialize)]
struct WirePortfolio {
    #[serde(default, rename = "masterSpec")]
    master_spec: Option<String>,
    #[serde(default, rename = "subSpecs")]
    sub_specs: Vec<WireSubSpec>,
}

#[derive(Debug, Deserialize)]
struct WireSubSpec {
    id: String,
}

#[derive(Debug, Deserialize)]
struct WireOutcome {
    status: String,
    portfolio: WirePortfolio,
    #[serde(default)]
    orchestration: Option<WireOrchestration>,
    #[serde(default)]
    replan: Option<WireReplan>,
}

/// Invokes an external `runAutoCloseLoop`-shaped command once per goal.
pub struct ProcessSpecBuilder {
    program: String,
    args: Vec<String>,
}

impl ProcessSpecBuilder {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self { program: program.into(), args }
    }
}

#[async_trait]
impl SpecBuilder for ProcessSpecBuilder {
    async fn run_auto_close_loop(&self, options: SpecBuilderOptions) -> AcloResult<SpecBuilderOutcome> {
        let payload = json!({
            "goal": options.goal,
            "specPrefix": options.spec_prefix,
            "dodTestsCommand": options.dod_tests_command,
            "dodTestsTimeoutMs": options.dod_tests_timeout_ms,
        });

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| AcloError::GoalExecution { source_index: options.spec_prefix as usize, message: e.to_string() })?;

        if let Some(mut stdin) = child.stdin.take() {
            let bytes = serde_json::to_vec(&payload)?;
            stdin
                .write_all(&bytes)
                .await
                .map_err(|e| AcloError::GoalExecution { source_index: options.spec_prefix as usize, message: e.to_string() })?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| AcloError::GoalExecution { source_index: options.spec_prefix as usize, message: e.to_string() })?;

        if !output.status.success() {
            return Err(AcloError::GoalExecution {
                source_index: options.spec_prefix as usize,
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let wire: WireOutcome = serde_json::from_slice(&output.stdout).map_err(|e| AcloError::GoalExecution {
            source_index: options.spec_prefix as usize,
            message: format!("malformed spec-builder output: {e}"),
        })?;

        Ok(SpecBuilderOutcome {
            status: wire.status,
            portfolio: SpecPortfolio {
                master_spec: wire.portfolio.master_spec,
                sub_specs: wire.portfolio.sub_specs.into_iter().map(|s| SubSpec { id: s.id }).collect(),
            },
            rate_limit: wire.orchestration.and_then(|o| o.rate_limit).map(|rl| RateLimitTelemetry {
                signal_count: rl.signal_count,
                total_backoff_ms: rl.total_backoff_ms,
                last_launch_hold_ms: rl.last_launch_hold_ms,
            }),
            replan_performed: wire.replan.is_some_and(|r| r.performed),
        })
    }
}
