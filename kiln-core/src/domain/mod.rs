//! Core domain types
//!
//! These types describe the job-run state tracked by the orchestrator and are
//! shared with the client and CLI, which render them.

pub mod build;
pub mod job;
pub mod log;
pub mod timestamp;
