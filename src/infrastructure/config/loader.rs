//! Layered configuration loading for the orchestration kernel
//!
//! Precedence (lowest to highest):
//! 1. Programmatic defaults (`Serialized::defaults(GlobalConfig::default())`)
//! 2. `auto/config.json` (project config)
//! 3. `ACLO_*` environment variables, `__`-separated for nested keys

use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Json, Serialized};
use figment::Figment;

use crate::domain::models::config::GlobalConfig;

/// Loads and validates `GlobalConfig` from the layered JSON/env chain.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration rooted at `workspace_root/auto/config.json`.
    pub fn load(workspace_root: impl AsRef<Path>) -> Result<GlobalConfig> {
        let config_path = workspace_root.as_ref().join("auto").join("config.json");
        Self::load_from_file(config_path)
    }

    /// Load configuration from a specific `config.json` path, falling back
    /// to defaults if the file does not exist.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<GlobalConfig> {
        let path = path.as_ref();
        let mut figment = Figment::new().merge(Serialized::defaults(GlobalConfig::default()));
        if path.exists() {
            figment = figment.merge(Json::file(path));
        }
        let config: GlobalConfig = figment
            .merge(Env::prefixed("ACLO_").split("__"))
            .extract()
            .with_context(|| format!("failed to extract configuration from {}", path.display()))?;

        config
            .validate()
            .map_err(|reason| anyhow::anyhow!("configuration validation failed: {reason}"))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_validate_when_no_file_present() {
        let config = ConfigLoader::load_from_file("/nonexistent/auto/config.json").unwrap();
        assert_eq!(config.session_retention_days, 90);
    }

    #[test]
    fn json_file_overrides_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"session_retention_days": 14}}"#).unwrap();
        file.flush().unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.session_retention_days, 14);
    }

    #[test]
    fn env_override_beats_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"session_retention_days": 14}}"#).unwrap();
        file.flush().unwrap();

        temp_env::with_var("ACLO_SESSION_RETENTION_DAYS", Some("7"), || {
            let config = ConfigLoader::load_from_file(file.path()).unwrap();
            assert_eq!(config.session_retention_days, 7);
        });
    }

    #[test]
    fn invalid_override_fails_validation() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"queue_lock_ttl_seconds": 0}}"#).unwrap();
        file.flush().unwrap();

        assert!(ConfigLoader::load_from_file(file.path()).is_err());
    }
}
