//! Spec-session and collaboration-metadata collaborator contracts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::AcloResult;

/// One enumerated spec workdir.
#[derive(Debug, Clone)]
pub struct SpecSessionEntry {
    pub spec_id: String,
    pub modified_at: DateTime<Utc>,
}

/// Port over spec-session directory enumeration. Filesystem layout of
/// generated spec directories is explicitly out of scope; the
/// kernel only consumes this typed listing for budget accounting and prune
/// protection.
#[async_trait]
pub trait SpecSessionReader: Send + Sync {
    async fn read_spec_session_entries(&self) -> AcloResult<Vec<SpecSessionEntry>>;
}

/// Dependency edge between two specs.
#[derive(Debug, Clone)]
pub struct SpecDependency {
    pub spec: String,
    pub dependency_type: String,
}

/// Per-spec collaboration status: `current ∈
/// {completed, in-progress, not-started, blocked}`.
#[derive(Debug, Clone)]
pub struct CollaborationStatus {
    pub current: String,
    pub dependencies: Vec<SpecDependency>,
}

/// Port over per-spec collaboration metadata. Missing metadata for a spec is
/// treated as active to avoid unsafe deletion.
#[async_trait]
pub trait CollaborationMetadataReader: Send + Sync {
    async fn read_status(&self, spec_id: &str) -> AcloResult<Option<CollaborationStatus>>;
}
