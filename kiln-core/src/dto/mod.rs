//! Data Transfer Objects
//!
//! Request and response bodies for the orchestrator HTTP API. Domain
//! entities are sent as-is; DTOs only exist where a request needs its own
//! shape or a response aggregates several entities.

pub mod build;
pub mod job;
