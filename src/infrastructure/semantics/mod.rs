//! Filesystem-free default implementation of the goal semantic analyzer
//! port.
//!
//! `analyzeGoalSemantics` is an out-of-scope pure function the kernel only
//! consumes. This module supplies a deterministic, dependency-free default
//! so the `aclo` binary can decompose a goal without an external service:
//! split on clause-boundary connectors, then score each clause's word
//! count, connector density, and domain-signal hits against the same
//! category vocabulary the decomposer's canned-template library names.

use std::collections::HashMap;

use crate::domain::ports::semantics::{Clause, GoalSemantics, GoalSemanticsAnalyzer};

const CONNECTORS: &[&str] = &["and then", "and", "then", "while", "after", "before", "so that", "in order to"];

/// Category → keyword vocabulary, aligned with `decomposer::CANNED_TEMPLATES`
/// and the scheduler's criticality keyword lists.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("close-loop", &["close-loop", "close loop", "autonomous", "self-healing", "converge"]),
    ("decomposition", &["decompose", "sub-goal", "breakdown", "split", "plan"]),
    ("orchestration", &["orchestrate", "schedule", "coordinate", "parallel", "pipeline"]),
    ("quality", &["test", "quality", "validation", "compliance", "gate", "verify"]),
    ("docs", &["document", "docs", "runbook", "readme", "guide"]),
];

/// Splits free text on clause-boundary connectors and punctuation, then
/// scores each clause against the fixed category vocabulary.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicGoalSemanticsAnalyzer;

fn split_clauses(goal: &str) -> Vec<String> {
    let mut text = goal.to_string();
    for connector in CONNECTORS {
        text = text.replace(connector, "|");
    }
    text.split(|c: char| c == '|' || c == ',' || c == ';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn connector_count(clause: &str) -> u32 {
    let lower = clause.to_lowercase();
    CONNECTORS.iter().filter(|c| lower.contains(*c)).count() as u32
}

fn domain_signal_count(clause: &str) -> u32 {
    let lower = clause.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .flat_map(|(_, keywords)| keywords.iter())
        .filter(|kw| lower.contains(*kw))
        .count() as u32
}

fn category_scores(goal: &str) -> HashMap<String, f64> {
    let lower = goal.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .map(|(name, keywords)| {
            let hits = keywords.iter().filter(|kw| lower.contains(*kw)).count() as f64;
            ((*name).to_string(), hits)
        })
        .collect()
}

impl GoalSemanticsAnalyzer for HeuristicGoalSemanticsAnalyzer {
    fn analyze(&self, goal: &str) -> GoalSemantics {
        let clauses: Vec<Clause> = split_clauses(goal)
            .into_iter()
            .map(|text| Clause {
                word_count: text.split_whitespace().count() as u32,
                connector_count: connector_count(&text),
                domain_signal_count: domain_signal_count(&text),
                text,
            })
            .collect();

        let category_scores = category_scores(goal);
        let mut ranked_categories: Vec<String> =
            category_scores.iter().filter(|(_, &score)| score > 0.0).map(|(name, _)| name.clone()).collect();
        ranked_categories.sort_by(|a, b| {
            category_scores[b].partial_cmp(&category_scores[a]).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.cmp(b))
        });
        if ranked_categories.is_empty() {
            ranked_categories = CATEGORY_KEYWORDS.iter().map(|(name, _)| (*name).to_string()).collect();
        }

        GoalSemantics { clauses, category_scores, ranked_categories }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_connectors_and_commas() {
        let analyzer = HeuristicGoalSemanticsAnalyzer;
        let semantics = analyzer.analyze("ship the scheduler, then write docs and harden the core data layer");
        assert!(semantics.clauses.len() >= 3);
    }

    #[test]
    fn ranks_categories_by_keyword_hits() {
        let analyzer = HeuristicGoalSemanticsAnalyzer;
        let semantics = analyzer.analyze("add test coverage and a compliance validation gate");
        assert_eq!(semantics.ranked_categories.first().map(String::as_str), Some("quality"));
    }

    #[test]
    fn falls_back_to_full_category_list_when_no_keywords_match() {
        let analyzer = HeuristicGoalSemanticsAnalyzer;
        let semantics = analyzer.analyze("xyzzy plugh");
        assert_eq!(semantics.ranked_categories.len(), CATEGORY_KEYWORDS.len());
    }
}
