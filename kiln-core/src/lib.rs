//! Kiln Core
//!
//! Core types shared by every Kiln crate.
//!
//! This crate contains:
//! - Domain types: jobs, build records and console lines
//! - DTOs: request and response bodies exchanged with the orchestrator API

pub mod domain;
pub mod dto;
