//! Goal semantic analysis collaborator contract.
//!
//! `analyzeGoalSemantics` is an explicitly out-of-scope pure function; the
//! kernel only consumes its typed result to drive decomposition.

use std::collections::HashMap;

/// One clause extracted from a goal's free text.
#[derive(Debug, Clone)]
pub struct Clause {
    pub text: String,
    pub word_count: u32,
    pub connector_count: u32,
    pub domain_signal_count: u32,
}

/// Result of `analyzeGoalSemantics(goal)`.
#[derive(Debug, Clone)]
pub struct GoalSemantics {
    pub clauses: Vec<Clause>,
    pub category_scores: HashMap<String, f64>,
    pub ranked_categories: Vec<String>,
}

/// Pure port over the semantic analyzer. No I/O, no async — a real
/// implementation is a deterministic function of its input text.
pub trait GoalSemanticsAnalyzer: Send + Sync {
    fn analyze(&self, goal: &str) -> GoalSemantics;
}
