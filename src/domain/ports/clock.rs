//! Clock and id-generation abstractions.
//!
//! Global mutable state (`process.cwd()`, `Date.now()`, ad-hoc randomness) is
//! replaced by explicit passing: tests reproduce ids and timestamps by
//! substituting a fixed clock/id source for the system one.

use chrono::{DateTime, Utc};

/// Source of the current time, injected so tests can freeze it.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Real wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Source of opaque unique tokens (lock tokens, correlation ids).
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Real `uuid` v4-backed id generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
pub mod test_support {
    use super::{Clock, DateTime, IdGenerator, Utc};
    use std::sync::atomic::{AtomicU64, Ordering};

    /// A clock fixed at construction time, for deterministic tests.
    #[derive(Debug, Clone, Copy)]
    pub struct FixedClock(pub DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    /// An id generator that yields a deterministic, incrementing sequence.
    #[derive(Debug, Default)]
    pub struct SequentialIdGenerator(AtomicU64);

    impl IdGenerator for SequentialIdGenerator {
        fn generate(&self) -> String {
            let n = self.0.fetch_add(1, Ordering::Relaxed);
            format!("test-id-{n}")
        }
    }
}
