//! Use-case services on top of the store, cache and fetch engine.
//!
//! # Responsibility
//! - Orchestrate seeding and measured scenarios into reportable results.
//! - Keep the CLI decoupled from store and cache wiring.

pub mod benchmark_service;

pub use benchmark_service::{
    BenchmarkService, ComparisonReport, LabReport, ScenarioReport, ServiceError, ServiceResult,
};
