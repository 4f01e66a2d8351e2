//! External spec-builder collaborator contract.
//!
//! `runAutoCloseLoop` itself — the system that synthesizes requirement,
//! design, and task documents from a goal — is explicitly out of scope. The
//! kernel only invokes it once per admitted plan and consumes its result.

use async_trait::async_trait;

use crate::domain::errors::AcloResult;
use crate::domain::models::RateLimitTelemetry;

/// Per-goal options the scheduler passes down to one spec-builder invocation.
#[derive(Debug, Clone)]
pub struct SpecBuilderOptions {
    pub goal: String,
    pub spec_prefix: u32,
    pub dod_tests_command: Option<String>,
    pub dod_tests_timeout_ms: Option<u64>,
}

/// One sub-spec produced alongside the master spec.
#[derive(Debug, Clone)]
pub struct SubSpec {
    pub id: String,
}

/// The portfolio returned by one `runAutoCloseLoop` invocation.
#[derive(Debug, Clone)]
pub struct SpecPortfolio {
    pub master_spec: Option<String>,
    pub sub_specs: Vec<SubSpec>,
}

/// Outcome of invoking the external spec builder for one goal:
/// `{ status, portfolio, orchestration?.rateLimit?, replan?.performed }`.
#[derive(Debug, Clone)]
pub struct SpecBuilderOutcome {
    pub status: String,
    pub portfolio: SpecPortfolio,
    pub rate_limit: Option<RateLimitTelemetry>,
    pub replan_performed: bool,
}

/// Port over the external spec-builder collaborator. Implementations own
/// the actual synthesis; the kernel only consumes the typed outcome.
#[async_trait]
pub trait SpecBuilder: Send + Sync {
    async fn run_auto_close_loop(&self, options: SpecBuilderOptions) -> AcloResult<SpecBuilderOutcome>;
}
