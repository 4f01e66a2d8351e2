//! `aclo config` — show the effective layered configuration.

use serde_json::Value;

use crate::cli::output::CommandOutput;
use crate::domain::models::config::GlobalConfig;

struct ConfigOutput<'a>(&'a GlobalConfig);

impl CommandOutput for ConfigOutput<'_> {
    fn to_human(&self) -> String {
        serde_json::to_string_pretty(self.0).unwrap_or_default()
    }

    fn to_json(&self) -> Value {
        serde_json::to_value(self.0).unwrap_or(Value::Null)
    }
}

impl serde::Serialize for ConfigOutput<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

pub fn handle_config(global: &GlobalConfig, json_mode: bool) {
    crate::cli::output::output(&ConfigOutput(global), json_mode);
}
