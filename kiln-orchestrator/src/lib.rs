//! Kiln orchestrator
//!
//! Tracks named jobs through `Idle -> Running -> {Success, Failed, Cancelled}`,
//! keeps an append-only build history and runs post-build plugins after
//! successful builds. Served over HTTP by the `kiln-orchestrator` binary.

pub mod api;
pub mod config;
pub mod context;
pub mod plugin;
pub mod repository;
pub mod seed;
pub mod service;
pub mod startup;
