//! Session archive envelope.
//!
//! Four independent directories under the hidden workspace dir hold one
//! session kind each: close-loop, batch, controller, governance. Every file
//! shares the same envelope: schema version, mode, status, and a kind-specific
//! payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The four session kinds, each with its own archive directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionKind {
    CloseLoop,
    Batch,
    Controller,
    Governance,
}

impl SessionKind {
    /// Directory name under `auto/`.
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::CloseLoop => "close-loop-sessions",
            Self::Batch => "close-loop-batch-summaries",
            Self::Controller => "close-loop-controller-sessions",
            Self::Governance => "governance-close-loop-sessions",
        }
    }

    pub const fn prefix(self) -> &'static str {
        match self {
            Self::CloseLoop => "close-loop",
            Self::Batch => "batch",
            Self::Controller => "controller",
            Self::Governance => "governance",
        }
    }
}

/// The exact set of `schema_version` strings this kernel reads and writes.
/// A file with a missing or unknown version is left untouched in checks and
/// migrations opt-in.
pub const SUPPORTED_SCHEMA_VERSIONS: &[&str] = &["1.0"];

pub const CURRENT_SCHEMA_VERSION: &str = "1.0";

/// Reference to the session's own archive file, embedded under the
/// `<kind>_session` key of the envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRef {
    pub id: String,
    pub file: String,
}

/// The common envelope every session JSON carries, with kind-specific
/// payload left generic:
/// ```text
/// { schema_version, mode, status, updated_at, <kind>_session: {id, file}, ...fields }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEnvelope {
    pub schema_version: String,
    pub mode: String,
    pub status: String,
    pub updated_at: DateTime<Utc>,
    pub session_ref: SessionRef,
    /// Kind-specific fields, flattened at the top level on (de)serialization.
    #[serde(flatten)]
    pub payload: Value,
}

impl SessionEnvelope {
    pub fn new(mode: impl Into<String>, status: impl Into<String>, session_ref: SessionRef, now: DateTime<Utc>, payload: Value) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION.to_string(),
            mode: mode.into(),
            status: status.into(),
            updated_at: now,
            session_ref,
            payload,
        }
    }

    pub fn is_supported_schema(&self) -> bool {
        SUPPORTED_SCHEMA_VERSIONS.contains(&self.schema_version.as_str())
    }
}

/// Generate a session id of the form `<kind>-<YYYYMMDDHHMMSS>`.
pub fn generate_session_id(kind: SessionKind, now: DateTime<Utc>) -> String {
    format!("{}-{}", kind.prefix(), now.format("%Y%m%d%H%M%S"))
}

/// Sanitize a proposed file name to `[a-zA-Z0-9._-]{1,80}.json`.
pub fn sanitize_file_name(raw: &str) -> String {
    let sanitized: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' { c } else { '_' })
        .collect();
    let trimmed: String = sanitized.chars().take(76).collect();
    format!("{trimmed}.json")
}

/// Outcome of listing one archive directory.
#[derive(Debug, Clone)]
pub enum ArchiveEntry {
    Valid { file_name: String, modified_at: DateTime<Utc>, envelope: Box<SessionEnvelope> },
    Invalid { file_name: String, modified_at: DateTime<Utc>, reason: String },
}

impl ArchiveEntry {
    pub const fn modified_at(&self) -> DateTime<Utc> {
        match self {
            Self::Valid { modified_at, .. } | Self::Invalid { modified_at, .. } => *modified_at,
        }
    }
}
