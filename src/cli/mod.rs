//! Command-line interface for the `aclo` binary.

pub mod commands;
pub mod output;
pub mod types;

pub use types::{ArchiveCommands, Cli, Commands, ControllerCommands, EvidenceCommands, QueueCommands};
