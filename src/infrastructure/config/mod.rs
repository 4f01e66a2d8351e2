//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment:
//! - JSON file loading (`auto/config.json`)
//! - `ACLO_`-prefixed environment variable overrides
//! - Configuration validation against `GlobalConfig::validate`

pub mod loader;

pub use loader::ConfigLoader;
