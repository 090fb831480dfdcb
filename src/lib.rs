//! Core library for the `restep` engine.
//!
//! This crate provides the building blocks for scenario-driven REST
//! diagnostics and load testing: the scenario configuration tree, the
//! concurrency-controlled sequencer, the per-request build→send→validate
//! pipeline, the cross-request substitution/extraction store, and lock-free
//! statistics. Scenario linting, CLI handling, metrics transport, and log
//! formatting are external collaborators.

pub mod config;
pub mod error;
pub mod execute;
pub mod metrics;
pub mod sequence;
pub mod stats;
pub mod store;
pub mod system;
