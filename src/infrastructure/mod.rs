//! Infrastructure layer
//!
//! Adapters for external dependencies: layered JSON configuration, the
//! `tracing`-based logging stack, and the filesystem-backed implementations
//! of the domain ports (goal queue, session archives, recovery-memory
//! store, spec-session enumeration).

pub mod config;
pub mod fs;
pub mod logging;
pub mod semantics;
pub mod spec_builder;
pub mod spec_session;
