//! Semantic Decomposer Adapter.
//!
//! Wraps the pure [`GoalSemanticsAnalyzer`] port to turn one broad goal into
//! N scored, ordered sub-goals, refining the result once if the initial
//! pass scores too low or looks thin.

use std::collections::HashSet;

use crate::domain::ports::semantics::{Clause, GoalSemantics, GoalSemanticsAnalyzer};

/// Fixed canned-template library, one entry per category, used to pad out a
/// decomposition that falls short of its target count.
const CANNED_TEMPLATES: &[(&str, &str)] = &[
    ("close-loop", "Build automatic closed-loop progression for the remaining scope"),
    ("decomposition", "Decompose the remaining scope into independently verifiable sub-goals"),
    ("orchestration", "Coordinate parallel execution and sequencing for the remaining scope"),
    ("quality", "Establish quality gates and verification coverage for the remaining scope"),
    ("docs", "Document the delivered scope and its operational runbook"),
];

const DEFAULT_QUALITY_THRESHOLD: u8 = 70;
const MIN_TARGET: u8 = 2;
const MAX_TARGET: u8 = 12;

/// One warning the scoring pass can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecompositionWarning {
    UnderProducedGoals,
    GoalsTooShort,
    CategoryCoverageLow,
    GoalDiversityLow,
}

impl DecompositionWarning {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnderProducedGoals => "under-produced-goals",
            Self::GoalsTooShort => "goals-too-short",
            Self::CategoryCoverageLow => "category-coverage-low",
            Self::GoalDiversityLow => "goal-diversity-low",
        }
    }
}

/// Result of one decomposition pass.
#[derive(Debug, Clone)]
pub struct Decomposition {
    pub goals: Vec<String>,
    /// Per-goal `(clause_count, domain_signal_count)`, parallel to `goals`,
    /// for `priority_calculator::complexity_weight` to derive
    /// `complexity_weight` from. Template/fallback goals carry `(0, 0)`.
    pub complexity_signals: Vec<(u32, u32)>,
    pub quality_score: f64,
    pub warnings: Vec<DecompositionWarning>,
}

/// Heuristic default target count from clause/category signal volume
///
fn heuristic_target_count(semantics: &GoalSemantics) -> u8 {
    let clause_count = semantics.clauses.len();
    let active_categories = semantics.category_scores.values().filter(|&&score| score > 0.0).count();
    if clause_count >= 8 || active_categories >= 4 {
        5
    } else if clause_count >= 5 || active_categories >= 3 {
        4
    } else {
        3
    }
}

fn clause_score(clause: &Clause) -> u32 {
    clause.word_count + 2 * clause.connector_count + 3 * clause.domain_signal_count
}

fn select_top_clauses(clauses: &[Clause], target: usize) -> Vec<&Clause> {
    let mut ranked: Vec<&Clause> = clauses.iter().collect();
    ranked.sort_by(|a, b| clause_score(b).cmp(&clause_score(a)));
    ranked.into_iter().take(target).collect()
}

fn render_clause(clause: &Clause, verbose: bool) -> String {
    if verbose {
        format!("Deliver {} as a dedicated execution track with explicit acceptance criteria", clause.text.trim())
    } else {
        clause.text.trim().to_string()
    }
}

fn pad_with_templates(goals: &mut Vec<(String, u32, u32)>, ranked_categories: &[String], target: usize) {
    for category in ranked_categories {
        if goals.len() >= target {
            break;
        }
        if let Some((_, template)) = CANNED_TEMPLATES.iter().find(|(name, _)| name == category) {
            goals.push(((*template).to_string(), 0, 0));
        }
    }
}

fn score_pass(goals: &[(String, u32, u32)], target: usize, active_categories: usize) -> (f64, Vec<DecompositionWarning>) {
    let mut warnings = Vec::new();

    let coverage = if target == 0 { 1.0 } else { (goals.len() as f64 / target as f64).min(1.0) };
    if goals.len() < target {
        warnings.push(DecompositionWarning::UnderProducedGoals);
    }

    let category_coverage = (active_categories as f64 / CANNED_TEMPLATES.len() as f64).min(1.0);
    if category_coverage < 0.4 {
        warnings.push(DecompositionWarning::CategoryCoverageLow);
    }

    let avg_words = if goals.is_empty() {
        0.0
    } else {
        goals.iter().map(|(g, _, _)| g.split_whitespace().count() as f64).sum::<f64>() / goals.len() as f64
    };
    if avg_words < 6.0 {
        warnings.push(DecompositionWarning::GoalsTooShort);
    }

    let unique: HashSet<String> =
        goals.iter().map(|(g, _, _)| g.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()).collect();
    let diversity = if goals.is_empty() { 1.0 } else { unique.len() as f64 / goals.len() as f64 };
    if diversity < 0.8 {
        warnings.push(DecompositionWarning::GoalDiversityLow);
    }

    let score = 45.0 * coverage + 25.0 * category_coverage + 20.0 * (avg_words / 12.0).min(1.0) + 10.0 * diversity;
    (score, warnings)
}

fn split_goals(pairs: Vec<(String, u32, u32)>) -> (Vec<String>, Vec<(u32, u32)>) {
    pairs.into_iter().map(|(text, clause_count, domain_signal_count)| (text, (clause_count, domain_signal_count))).unzip()
}

/// Decompose `goal` using `analyzer`, refining once if the first pass scores
/// below `quality_threshold` or looks under-produced/too-short.
pub fn decompose(
    analyzer: &dyn GoalSemanticsAnalyzer,
    goal: &str,
    target_sub_goal_count: Option<u8>,
    quality_threshold: Option<u8>,
) -> Decomposition {
    let semantics = analyzer.analyze(goal);
    let threshold = quality_threshold.unwrap_or(DEFAULT_QUALITY_THRESHOLD);
    let target = target_sub_goal_count.unwrap_or_else(|| heuristic_target_count(&semantics)).clamp(MIN_TARGET, MAX_TARGET) as usize;
    let active_categories = semantics.category_scores.values().filter(|&&score| score > 0.0).count();

    let initial = build_pass(&semantics, goal, target, false);
    let (initial_score, initial_warnings) = score_pass(&initial, target, active_categories);

    let needs_refinement = initial_score < f64::from(threshold)
        || initial_warnings.contains(&DecompositionWarning::GoalsTooShort)
        || initial_warnings.contains(&DecompositionWarning::UnderProducedGoals);

    if !needs_refinement {
        let (goals, complexity_signals) = split_goals(initial);
        return Decomposition { goals, complexity_signals, quality_score: initial_score, warnings: initial_warnings };
    }

    let refined = build_pass(&semantics, goal, target, true);
    let (refined_score, refined_warnings) = score_pass(&refined, target, active_categories);

    // Keep whichever scores higher, ties broken by fewer warnings.
    let refined_wins = refined_score > initial_score
        || (refined_score == initial_score && refined_warnings.len() < initial_warnings.len());

    if refined_wins {
        let (goals, complexity_signals) = split_goals(refined);
        Decomposition { goals, complexity_signals, quality_score: refined_score, warnings: refined_warnings }
    } else {
        let (goals, complexity_signals) = split_goals(initial);
        Decomposition { goals, complexity_signals, quality_score: initial_score, warnings: initial_warnings }
    }
}

/// Per-clause complexity signal: `(word_count + connector_count,
/// domain_signal_count)`, fed straight into
/// `priority_calculator::complexity_weight`. Template/fallback goals carry
/// no clause, so they score `(0, 0)` — the lowest complexity tier.
fn build_pass(semantics: &GoalSemantics, goal: &str, target: usize, verbose: bool) -> Vec<(String, u32, u32)> {
    let top_clauses = select_top_clauses(&semantics.clauses, target);
    let mut goals: Vec<(String, u32, u32)> = top_clauses
        .iter()
        .map(|c| (render_clause(c, verbose), c.word_count + c.connector_count, c.domain_signal_count))
        .collect();

    if goals.len() < target {
        pad_with_templates(&mut goals, &semantics.ranked_categories, target);
    }
    if goals.is_empty() {
        goals.push((goal.trim().to_string(), 0, 0));
    }
    goals
}

/// Whether a final score below `quality_threshold` under an explicit quality
/// gate should fail the run.
pub fn quality_gate_failed(score: f64, quality_threshold: Option<u8>, quality_gate_enabled: bool) -> bool {
    quality_gate_enabled && quality_threshold.is_some_and(|threshold| score < f64::from(threshold))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FixedAnalyzer(GoalSemantics);
    impl GoalSemanticsAnalyzer for FixedAnalyzer {
        fn analyze(&self, _goal: &str) -> GoalSemantics {
            GoalSemantics {
                clauses: self.0.clauses.clone(),
                category_scores: self.0.category_scores.clone(),
                ranked_categories: self.0.ranked_categories.clone(),
            }
        }
    }

    fn clause(text: &str, words: u32, connectors: u32, signals: u32) -> Clause {
        Clause { text: text.to_string(), word_count: words, connector_count: connectors, domain_signal_count: signals }
    }

    #[test]
    fn pads_with_category_templates_when_short_on_clauses() {
        let mut category_scores = HashMap::new();
        category_scores.insert("close-loop".to_string(), 1.0);
        category_scores.insert("docs".to_string(), 1.0);
        let analyzer = FixedAnalyzer(GoalSemantics {
            clauses: vec![clause("ship the scheduler", 12, 2, 3)],
            category_scores,
            ranked_categories: vec!["close-loop".into(), "docs".into()],
        });

        let decomposition = decompose(&analyzer, "ship the scheduler", Some(3), Some(70));
        assert_eq!(decomposition.goals.len(), 3);
    }

    #[test]
    fn empty_semantics_falls_back_to_goal_text() {
        let analyzer = FixedAnalyzer(GoalSemantics { clauses: vec![], category_scores: HashMap::new(), ranked_categories: vec![] });
        let decomposition = decompose(&analyzer, "ship the scheduler", Some(2), Some(70));
        assert!(decomposition.goals.iter().any(|g| g == "ship the scheduler"));
    }

    #[test]
    fn quality_gate_fails_below_threshold_when_enabled() {
        assert!(quality_gate_failed(50.0, Some(70), true));
        assert!(!quality_gate_failed(50.0, Some(70), false));
        assert!(!quality_gate_failed(80.0, Some(70), true));
    }

    #[test]
    fn high_signal_goal_needs_no_refinement_padding_beyond_target() {
        let mut category_scores = HashMap::new();
        for name in ["close-loop", "decomposition", "orchestration", "quality"] {
            category_scores.insert(name.to_string(), 1.0);
        }
        let clauses = vec![
            clause("establish the core orchestration loop for the scheduler", 14, 3, 4),
            clause("wire the decomposition adapter into the pipeline end to end", 14, 3, 4),
            clause("add strict quality gates around every batch execution run", 14, 3, 4),
        ];
        let analyzer = FixedAnalyzer(GoalSemantics {
            clauses,
            category_scores,
            ranked_categories: vec!["close-loop".into(), "decomposition".into(), "orchestration".into(), "quality".into()],
        });

        let decomposition = decompose(&analyzer, "ship the orchestrator", Some(3), Some(70));
        assert_eq!(decomposition.goals.len(), 3);
        assert!(decomposition.quality_score >= 70.0);
    }

    #[test]
    fn complexity_signals_carry_clause_counts_and_zero_out_for_templates() {
        let mut category_scores = HashMap::new();
        category_scores.insert("close-loop".to_string(), 1.0);
        category_scores.insert("docs".to_string(), 1.0);
        let analyzer = FixedAnalyzer(GoalSemantics {
            clauses: vec![clause("ship the scheduler end to end", 12, 2, 3)],
            category_scores,
            ranked_categories: vec!["close-loop".into(), "docs".into()],
        });

        let decomposition = decompose(&analyzer, "ship the scheduler", Some(3), Some(70));
        assert_eq!(decomposition.complexity_signals.len(), decomposition.goals.len());
        assert_eq!(decomposition.complexity_signals[0], (14, 3));
        assert_eq!(decomposition.complexity_signals[1], (0, 0));
        assert_eq!(decomposition.complexity_signals[2], (0, 0));
    }
}
