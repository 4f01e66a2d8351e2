//! ACLO — Autonomous Close-Loop Orchestrator
//!
//! A headless control-plane kernel that decomposes a goal into sub-goal
//! specs, schedules and executes them under a weighted-priority, resource
//! budgeted scheduler, retries failures through bounded backoff rounds,
//! recovers from repeat failure signatures via a scored remediation
//! catalog, evaluates convergence gates with a profile fallback chain, and
//! optionally drives an iterative governance loop on top of all of it.

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::errors::{AcloError, AcloResult};
