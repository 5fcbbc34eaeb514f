//! Scoped, reversible access to a repository under test.
//!
//! [`TestRepo`] stages a fixture into a working tree, records every artifact
//! the test body creates, and reverses all of it when it is torn down or
//! dropped.

mod artifacts;
mod error;
mod logging;
mod plan;
mod repo;
mod staging;

pub use artifacts::{StagedFile, TrackedArtifacts};
pub use error::HarnessError;
pub use logging::{init_test_logging, init_test_logging_with};
pub use plan::{ReversalAction, TeardownFailure, TeardownReport};
pub use repo::{ScopeConfig, TestRepo};
pub use staging::BACKUP_SUFFIX;
