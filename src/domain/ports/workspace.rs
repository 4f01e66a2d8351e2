//! Workspace handle: the single threaded context for every kernel call
//!
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::clock::{Clock, IdGenerator, SystemClock, UuidGenerator};

/// Project root, clock, and id source, threaded through every call instead
/// of relying on `process.cwd()` and ad-hoc side effects.
#[derive(Clone)]
pub struct Workspace {
    root: PathBuf,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), clock: Arc::new(SystemClock), ids: Arc::new(UuidGenerator) }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `auto/` layout root.
    pub fn auto_dir(&self) -> PathBuf {
        self.root.join("auto")
    }

    pub fn specs_dir(&self) -> PathBuf {
        self.root.join("specs")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.root.join("reports")
    }

    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    pub fn generate_id(&self) -> String {
        self.ids.generate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_dir_nests_under_root() {
        let workspace = Workspace::new("/tmp/project");
        assert_eq!(workspace.auto_dir(), PathBuf::from("/tmp/project/auto"));
    }
}
