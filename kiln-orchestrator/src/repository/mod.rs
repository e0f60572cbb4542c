//! Repository Module
//!
//! Storage layer for the orchestrator.
//! Jobs live in a JSON mapping that is rewritten atomically on every save;
//! build history is an append-only CSV ledger.

pub mod build_log;
pub mod error;
pub mod job;

pub use build_log::{BuildLog, BuildRecords};
pub use error::StoreError;
pub use job::{JobMap, JobStore, LoadWarning};
