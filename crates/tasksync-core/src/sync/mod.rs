//! Bidirectional sync between local todos and a remote task provider.

pub mod conflict;
pub mod engine;
pub mod types;

#[cfg(test)]
mod engine_tests;
#[cfg(test)]
pub(crate) mod test_support;

pub use conflict::{resolve, Decision, Resolution};
pub use engine::SyncEngine;
pub use types::{
    IncrementalOutcome, SyncError, SyncItemError, SyncOp, SyncOptions, SyncResult,
    SyncStatusReport,
};
