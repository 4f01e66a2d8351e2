//! Domain models
//!
//! Pure domain entities with business logic and validation rules.
//! These models are framework-agnostic and contain no infrastructure concerns.

pub mod batch;
pub mod config;
pub mod gate;
pub mod goal;
pub mod governance;
pub mod kpi;
pub mod plan;
pub mod prune;
pub mod queue;
pub mod recovery;
pub mod retry;
pub mod session;

pub use batch::{
    BatchResult, BatchStatus, BatchSummary, GoalInputGuard, RateLimitTelemetry, ResultStatus,
    SpecSessionBudget, SpecSessionGrowthGuard,
};
pub use config::{BatchConfig, GlobalConfig, GoalConfig, LoggingConfig, ProgramConfig};
pub use gate::{
    FallbackChain, GateInputs, GateOutcome, GateProfile, GateProfileName, GateSource, GateVerdict,
    GateViolation, RiskLevel,
};
pub use goal::Goal;
pub use governance::{
    AnomalySeverity, GovernanceExecutionMode, GovernanceRoundRecord, GovernanceSession, StopReason,
};
pub use kpi::{
    Anomaly, AnomalyType, EvidenceWindowAggregate, GateHistoryEntry, ReleaseEvidenceEntry,
    RegressionComparison, RiskLayer, TrendBucket, TrendMode, TrendPeriod,
};
pub use plan::{PriorityStrategy, ResourcePlan, SubGoalPlan};
pub use prune::{ProtectionReason, PruneResult, SpecProtectionEntry};
pub use queue::{QueueItem, TaskQueue};
pub use recovery::{
    ActionEntry, ActionPriority, RecoveryMemoryFile, RemediationAction, RemediationCandidate,
    SelectionSource, SignatureEntry,
};
pub use retry::{RetryPolicy, RetryRoundHistory, RetryStrategy};
pub use session::{
    ArchiveEntry, SessionEnvelope, SessionKind, SessionRef, CURRENT_SCHEMA_VERSION,
    SUPPORTED_SCHEMA_VERSIONS,
};
