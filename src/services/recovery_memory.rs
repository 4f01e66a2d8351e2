//! Recovery Memory.
//!
//! Builds a deterministic remediation-action catalog from a failed batch,
//! selects one action (explicit override, scored memory, or default), and
//! updates the persisted statistics once the chosen action's outcome is
//! known. No LLM or other non-deterministic input ever enters this path.

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::domain::errors::AcloResult;
use crate::domain::models::batch::{BatchResult, BatchSummary, ResultStatus};
use crate::domain::models::plan::PriorityStrategy;
use crate::domain::models::recovery::{
    ActionEntry, ActionPriority, RecoveryMemoryFile, RemediationAction, RemediationCandidate,
    SelectionSource, SignatureEntry,
};
use crate::infrastructure::fs::recovery_store::RecoveryMemoryStore;
use crate::services::circuit_breaker::CircuitBreaker;
use crate::services::event_bus::{make_event, EventBus, EventCategory, EventSeverity, KernelEvent};

const MAX_CATALOG_SIZE: usize = 5;
const NORMALIZED_ERROR_MAX_LEN: usize = 120;
const TOP_CLUSTER_COUNT: usize = 3;

fn digit_pattern() -> &'static Regex {
    static DIGIT: OnceLock<Regex> = OnceLock::new();
    DIGIT.get_or_init(|| Regex::new(r"\d+").expect("static pattern"))
}

fn path_pattern() -> &'static Regex {
    static PATH: OnceLock<Regex> = OnceLock::new();
    PATH.get_or_init(|| Regex::new(r#"(?:/[^\s/'"]+){2,}"#).expect("static pattern"))
}

fn quote_pattern() -> &'static Regex {
    static QUOTE: OnceLock<Regex> = OnceLock::new();
    QUOTE.get_or_init(|| Regex::new(r#"['"]"#).expect("static pattern"))
}

fn whitespace_pattern() -> &'static Regex {
    static WS: OnceLock<Regex> = OnceLock::new();
    WS.get_or_init(|| Regex::new(r"\s+").expect("static pattern"))
}

fn timeout_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)timeout|deadline|killed").expect("static pattern"))
}

fn dod_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)dod|test|validation|compliance").expect("static pattern"))
}

/// Normalize a raw error message into a stable clustering key:
/// lowercase, digit runs collapsed to `#`, path-like tokens collapsed to
/// `<path>`, quotes stripped, whitespace collapsed, truncated to 120 chars.
pub fn normalize_error(message: &str) -> String {
    let lowered = message.to_lowercase();
    let digits_collapsed = digit_pattern().replace_all(&lowered, "#");
    let paths_collapsed = path_pattern().replace_all(&digits_collapsed, "<path>");
    let quotes_stripped = quote_pattern().replace_all(&paths_collapsed, "");
    let collapsed = whitespace_pattern().replace_all(quotes_stripped.trim(), " ");
    collapsed.chars().take(NORMALIZED_ERROR_MAX_LEN).collect()
}

fn status_token(status: ResultStatus) -> &'static str {
    match status {
        ResultStatus::Failed => "failed",
        ResultStatus::Error => "error",
        ResultStatus::Stopped => "stopped",
        ResultStatus::Unknown | ResultStatus::Completed | ResultStatus::Planned | ResultStatus::Prepared => {
            "unknown"
        }
    }
}

/// Group retryable results by `status:normalized_error` and return the top
/// 3 clusters by frequency, ties broken lexicographically.
pub fn failure_clusters(results: &[BatchResult]) -> Vec<String> {
    let mut counts: HashMap<String, u32> = HashMap::new();
    for result in results {
        if !result.is_retryable() {
            continue;
        }
        let normalized = result.error.as_deref().map(normalize_error).unwrap_or_default();
        let key = format!("{}:{normalized}", status_token(result.status));
        *counts.entry(key).or_insert(0) += 1;
    }
    let mut clusters: Vec<(String, u32)> = counts.into_iter().collect();
    clusters.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    clusters.into_iter().take(TOP_CLUSTER_COUNT).map(|(key, _)| key).collect()
}

/// Build the failure signature for one batch:
/// `scope-<scope>|<mode>|failed-<n>|<top-3 cluster signatures>`.
pub fn build_signature(scope: &str, mode: &str, failed_count: usize, clusters: &[String]) -> String {
    let mut signature = format!("scope-{scope}|{mode}|failed-{failed_count}");
    for cluster in clusters {
        signature.push('|');
        signature.push_str(cluster);
    }
    signature
}

fn action_token(action: &RemediationAction) -> &'static str {
    match action {
        RemediationAction::Monitor => "monitor",
        RemediationAction::ResumePending => "resume-pending",
        RemediationAction::IncreaseRetry { .. } => "increase-retry",
        RemediationAction::ReduceParallel { .. } => "reduce-parallel",
        RemediationAction::EnforceDod { .. } => "enforce-dod",
    }
}

fn command_token(action: &RemediationAction) -> String {
    match action {
        RemediationAction::Monitor | RemediationAction::ResumePending => "none".to_string(),
        RemediationAction::IncreaseRetry { batch_retry_max_rounds } => batch_retry_max_rounds.to_string(),
        RemediationAction::ReduceParallel { batch_parallel, batch_agent_budget, .. } => {
            format!("{batch_parallel}-{batch_agent_budget}")
        }
        RemediationAction::EnforceDod { dod_tests_command, .. } => dod_tests_command.clone(),
    }
}

/// `action-<index>|<action-token>|<command-token>`.
pub fn action_key(index: usize, action: &RemediationAction) -> String {
    format!("action-{index}|{}|{}", action_token(action), command_token(action))
}

fn failure_text(results: &[BatchResult]) -> String {
    results.iter().filter(|r| r.is_retryable()).filter_map(|r| r.error.as_deref()).collect::<Vec<_>>().join(" ")
}

/// Build the deterministic remediation catalog for one batch,
/// capped at 5 candidates.
pub fn build_catalog(
    summary: &BatchSummary,
    retry_budget_exhausted: bool,
    dod_tests_command: &str,
) -> Vec<RemediationCandidate> {
    let mut entries: Vec<(ActionPriority, String, RemediationAction)> = Vec::new();

    if summary.failed_goals == 0 {
        entries.push((ActionPriority::Monitor, "Monitor — no failures".into(), RemediationAction::Monitor));
    } else {
        entries.push((
            ActionPriority::High,
            "Resume unresolved goals from latest summary".into(),
            RemediationAction::ResumePending,
        ));

        if retry_budget_exhausted {
            entries.push((
                ActionPriority::High,
                "Increase retry ceiling".into(),
                RemediationAction::IncreaseRetry { batch_retry_max_rounds: 15 },
            ));
        }

        let text = failure_text(&summary.results);
        if timeout_pattern().is_match(&text) {
            entries.push((
                ActionPriority::Medium,
                "Reduce parallel pressure".into(),
                RemediationAction::ReduceParallel {
                    batch_parallel: 2,
                    batch_agent_budget: 2,
                    priority_strategy: PriorityStrategy::ComplexFirst,
                    aging_factor: 2,
                },
            ));
        }
        if dod_pattern().is_match(&text) {
            entries.push((
                ActionPriority::Medium,
                "Run strict quality gates".into(),
                RemediationAction::EnforceDod {
                    dod_tests_command: dod_tests_command.to_string(),
                    dod_tasks_closed: true,
                },
            ));
        }
    }

    entries.truncate(MAX_CATALOG_SIZE);
    entries
        .into_iter()
        .enumerate()
        .map(|(i, (priority, label, action))| RemediationCandidate { index: i + 1, label, priority, action })
        .collect()
}

/// One selected remediation action plus where it came from.
pub struct Selection {
    pub candidate: RemediationCandidate,
    pub source: SelectionSource,
}

/// Select the remediation action to run: an explicit override
/// wins outright; otherwise every candidate is scored against recovery
/// memory (filtering out circuit-open actions), and the highest scorer with
/// any recorded attempts wins; otherwise the catalog defaults to action 1.
pub fn select(
    memory: &RecoveryMemoryFile,
    signature: &str,
    candidates: &[RemediationCandidate],
    explicit_use_action: Option<usize>,
    circuit_breaker: &CircuitBreaker,
    now: DateTime<Utc>,
) -> Option<Selection> {
    if candidates.is_empty() {
        return None;
    }

    if let Some(explicit) = explicit_use_action {
        if let Some(candidate) = candidates.iter().find(|c| c.index == explicit) {
            return Some(Selection { candidate: candidate.clone(), source: SelectionSource::Explicit });
        }
    }

    if let Some(entry) = memory.signatures.get(signature) {
        let mut scored: Vec<(&RemediationCandidate, f64, u32)> = candidates
            .iter()
            .map(|candidate| {
                let key = action_key(candidate.index, &candidate.action);
                let stats = entry.actions.get(&key);
                (candidate, stats.map_or(0.0, ActionEntry::score), stats.map_or(0, |s| s.attempts))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.2.cmp(&a.2))
                .then_with(|| a.0.index.cmp(&b.0.index))
        });

        let best_open = scored.into_iter().find(|(candidate, _, _)| {
            !circuit_breaker.is_open(signature, &action_key(candidate.index, &candidate.action), now)
        });

        if let Some((candidate, _, attempts)) = best_open {
            if attempts > 0 {
                return Some(Selection { candidate: candidate.clone(), source: SelectionSource::Memory });
            }
        }
    }

    candidates.first().cloned().map(|candidate| Selection { candidate, source: SelectionSource::Default })
}

/// Record one recovery cycle's outcome against both the signature and the
/// selected action.
pub fn record_outcome(
    memory: &mut RecoveryMemoryFile,
    circuit_breaker: &mut CircuitBreaker,
    signature: &str,
    scope: &str,
    candidate: &RemediationCandidate,
    succeeded: bool,
    now: DateTime<Utc>,
) {
    let entry = memory.signatures.entry(signature.to_string()).or_insert_with(|| SignatureEntry::new(scope));
    entry.record(succeeded, now);
    entry.last_selected_index = Some(candidate.index);

    let key = action_key(candidate.index, &candidate.action);
    let action_entry = entry.actions.entry(key.clone()).or_default();
    action_entry.record(succeeded, now);

    circuit_breaker.record(signature, &key, succeeded, now);
}

/// Build the signature, load memory, select an action, and emit
/// `RecoverySelected`. The caller runs the selected action and reports the
/// outcome back through [`complete_cycle`].
#[allow(clippy::too_many_arguments)]
pub async fn run_selection(
    store: &RecoveryMemoryStore,
    circuit_breaker: &CircuitBreaker,
    event_bus: &EventBus,
    summary: &BatchSummary,
    scope: &str,
    mode: &str,
    retry_budget_exhausted: bool,
    dod_tests_command: &str,
    explicit_use_action: Option<usize>,
    now: DateTime<Utc>,
) -> AcloResult<(String, Vec<RemediationCandidate>, Option<Selection>)> {
    let clusters = failure_clusters(&summary.results);
    let signature = build_signature(scope, mode, summary.failed_goals, &clusters);
    let catalog = build_catalog(summary, retry_budget_exhausted, dod_tests_command);
    let memory = store.load().await?;
    let selection = select(&memory, &signature, &catalog, explicit_use_action, circuit_breaker, now);

    if let Some(selection) = &selection {
        event_bus
            .publish(make_event(
                EventSeverity::Info,
                EventCategory::Recovery,
                None,
                KernelEvent::RecoverySelected {
                    signature: signature.clone(),
                    action_label: selection.candidate.label.clone(),
                    source: selection_source_token(selection.source).to_string(),
                },
            ))
            .await;
    }

    Ok((signature, catalog, selection))
}

fn selection_source_token(source: SelectionSource) -> &'static str {
    match source {
        SelectionSource::Explicit => "explicit",
        SelectionSource::Memory => "memory",
        SelectionSource::Default => "default",
    }
}

/// Persist the outcome of the selected action and emit `RecoveryUpdated`
///
pub async fn complete_cycle(
    store: &RecoveryMemoryStore,
    circuit_breaker: &mut CircuitBreaker,
    event_bus: &EventBus,
    signature: &str,
    scope: &str,
    candidate: &RemediationCandidate,
    succeeded: bool,
    now: DateTime<Utc>,
) -> AcloResult<()> {
    let mut memory = store.load().await?;
    record_outcome(&mut memory, circuit_breaker, signature, scope, candidate, succeeded, now);
    store.save(&memory).await?;

    event_bus
        .publish(make_event(
            EventSeverity::Info,
            EventCategory::Recovery,
            None,
            KernelEvent::RecoveryUpdated { signature: signature.to_string(), succeeded },
        ))
        .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::batch::{
        BatchStatus, GoalInputGuard, RateLimitTelemetry, SpecSessionBudget, SpecSessionGrowthGuard,
    };
    use crate::domain::models::plan::ResourcePlan;

    fn failed_result(index: usize, error: &str) -> BatchResult {
        BatchResult {
            source_index: index,
            status: ResultStatus::Failed,
            master_spec: None,
            sub_spec_count: 0,
            complexity_weight: 1,
            criticality_weight: 1,
            scheduling_weight: 1,
            wait_ticks: 0,
            batch_attempt: 1,
            replan_cycles: 0,
            rate_limit: RateLimitTelemetry::default(),
            error: Some(error.to_string()),
        }
    }

    fn summary(results: Vec<BatchResult>) -> BatchSummary {
        let failed = results.iter().filter(|r| r.is_retryable()).count();
        BatchSummary {
            mode: "batch".into(),
            status: BatchStatus::Failed,
            total_goals: results.len(),
            processed_goals: results.len(),
            completed_goals: results.len() - failed,
            failed_goals: failed,
            batch_parallel: 1,
            resource_plan: ResourcePlan::new(None, PriorityStrategy::Fifo, 1, None, 1),
            goal_input_guard: GoalInputGuard::default(),
            spec_session_budget: SpecSessionBudget::default(),
            spec_session_growth_guard: SpecSessionGrowthGuard::default(),
            results,
        }
    }

    #[test]
    fn normalize_error_collapses_digits_and_whitespace() {
        let normalized = normalize_error("Operation   timed out after 30000ms");
        assert_eq!(normalized, "operation timed out after #ms");
    }

    #[test]
    fn normalize_error_collapses_paths() {
        let normalized = normalize_error("cannot read /var/lib/app/config.json");
        assert_eq!(normalized, "cannot read <path>");
    }

    #[test]
    fn normalize_error_truncates_to_120_chars() {
        let long = "x".repeat(200);
        assert_eq!(normalize_error(&long).chars().count(), NORMALIZED_ERROR_MAX_LEN);
    }

    #[test]
    fn failure_clusters_rank_by_frequency() {
        let results = vec![
            failed_result(0, "request timeout after 5000ms"),
            failed_result(1, "request timeout after 9000ms"),
            failed_result(2, "dod validation failed"),
        ];
        let clusters = failure_clusters(&results);
        assert_eq!(clusters[0], "failed:request timeout after #ms");
    }

    #[test]
    fn catalog_is_monitor_only_when_no_failures() {
        let catalog = build_catalog(&summary(vec![]), false, "npm test");
        assert_eq!(catalog.len(), 1);
        assert!(matches!(catalog[0].action, RemediationAction::Monitor));
    }

    #[test]
    fn catalog_includes_timeout_and_dod_actions_when_matched() {
        let results = vec![failed_result(0, "operation timed out"), failed_result(1, "dod test failed")];
        let catalog = build_catalog(&summary(results), false, "npm test");
        assert!(catalog.iter().any(|c| matches!(c.action, RemediationAction::ReduceParallel { .. })));
        assert!(catalog.iter().any(|c| matches!(c.action, RemediationAction::EnforceDod { .. })));
    }

    #[test]
    fn catalog_caps_at_five_candidates() {
        let results = vec![failed_result(0, "timeout and dod test failed validation")];
        let catalog = build_catalog(&summary(results), true, "npm test");
        assert!(catalog.len() <= MAX_CATALOG_SIZE);
    }

    #[test]
    fn explicit_selection_wins_outright() {
        let catalog = build_catalog(&summary(vec![failed_result(0, "boom")]), false, "npm test");
        let memory = RecoveryMemoryFile::default();
        let breaker = CircuitBreaker::new(Default::default());
        let selection = select(&memory, "sig", &catalog, Some(1), &breaker, Utc::now()).unwrap();
        assert_eq!(selection.source, SelectionSource::Explicit);
        assert_eq!(selection.candidate.index, 1);
    }

    #[test]
    fn memory_selection_prefers_highest_scored_attempted_action() {
        let catalog = build_catalog(&summary(vec![failed_result(0, "boom")]), false, "npm test");
        let signature = "sig-a";
        let mut memory = RecoveryMemoryFile::default();
        let mut entry = SignatureEntry::new("scope-x");
        let key = action_key(1, &catalog[0].action);
        let mut action_entry = ActionEntry::default();
        action_entry.record(true, Utc::now());
        entry.actions.insert(key, action_entry);
        memory.signatures.insert(signature.to_string(), entry);

        let breaker = CircuitBreaker::new(Default::default());
        let selection = select(&memory, signature, &catalog, None, &breaker, Utc::now()).unwrap();
        assert_eq!(selection.source, SelectionSource::Memory);
        assert_eq!(selection.candidate.index, 1);
    }

    #[test]
    fn default_selection_when_no_memory_and_no_explicit() {
        let catalog = build_catalog(&summary(vec![failed_result(0, "boom")]), false, "npm test");
        let memory = RecoveryMemoryFile::default();
        let breaker = CircuitBreaker::new(Default::default());
        let selection = select(&memory, "unseen-signature", &catalog, None, &breaker, Utc::now()).unwrap();
        assert_eq!(selection.source, SelectionSource::Default);
        assert_eq!(selection.candidate.index, 1);
    }

    #[test]
    fn record_outcome_updates_signature_and_action_stats() {
        let mut memory = RecoveryMemoryFile::default();
        let mut breaker = CircuitBreaker::new(Default::default());
        let candidate =
            RemediationCandidate { index: 1, label: "Resume".into(), priority: ActionPriority::High, action: RemediationAction::ResumePending };
        record_outcome(&mut memory, &mut breaker, "sig-a", "scope-x", &candidate, true, Utc::now());

        let entry = memory.signatures.get("sig-a").unwrap();
        assert_eq!(entry.attempts, 1);
        assert_eq!(entry.successes, 1);
        assert!(entry.check_invariant());
    }
}
