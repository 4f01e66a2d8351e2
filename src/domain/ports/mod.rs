//! Ports: trait contracts for external collaborators the kernel consumes
//! but does not implement, plus the `Workspace`/`Clock`
//! abstractions the Design Notes require for reproducible tests.

pub mod clock;
pub mod semantics;
pub mod spec_builder;
pub mod spec_session;
pub mod workspace;

pub use clock::{Clock, IdGenerator, SystemClock, UuidGenerator};
pub use semantics::{Clause, GoalSemantics, GoalSemanticsAnalyzer};
pub use spec_builder::{SpecBuilder, SpecBuilderOptions, SpecBuilderOutcome, SpecPortfolio, SubSpec};
pub use spec_session::{CollaborationMetadataReader, CollaborationStatus, SpecDependency, SpecSessionEntry, SpecSessionReader};
pub use workspace::Workspace;
