//! Goal domain model.
//!
//! A goal is a single line of natural-language input to the orchestrator: a
//! non-empty, trimmed UTF-8 string. It carries no status of its own — the
//! kernel tracks progress through [`SubGoalPlan`](super::plan::SubGoalPlan)
//! and [`BatchResult`](super::batch::BatchResult) instead.

use serde::{Deserialize, Serialize};

/// A single goal as loaded from the queue: trimmed, non-empty UTF-8 text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Goal(String);

impl Goal {
    /// Build a goal from raw text, trimming surrounding whitespace.
    ///
    /// Returns `None` for text that is empty after trimming.
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let trimmed = text.into().trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Fingerprint used only for dedup counting, never for identity:
    /// lowercase with internal whitespace collapsed to single spaces.
    pub fn fingerprint(&self) -> String {
        self.0.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
    }
}

impl std::fmt::Display for Goal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Goal {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_whitespace() {
        let goal = Goal::new("  ship the scheduler  \n").unwrap();
        assert_eq!(goal.as_str(), "ship the scheduler");
    }

    #[test]
    fn rejects_blank_input() {
        assert!(Goal::new("   ").is_none());
        assert!(Goal::new("").is_none());
    }

    #[test]
    fn fingerprint_collapses_whitespace_and_case() {
        let a = Goal::new("Ship  the   Scheduler").unwrap();
        let b = Goal::new("ship the scheduler").unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), "ship the scheduler");
    }

    #[test]
    fn fingerprint_is_not_identity() {
        let a = Goal::new("Ship The Scheduler").unwrap();
        assert_ne!(a.fingerprint(), a.as_str());
    }
}
