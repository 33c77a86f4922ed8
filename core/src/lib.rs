#![deny(missing_docs)]
//! sync_core: shared building blocks for the sync jobs (config, run state,
//! bucket locks, due-ness, reporting, logging).

/// Configuration model and resolution of global options.
pub mod cfg;
/// Wall clock helpers.
pub mod clock;
/// Due-ness decision for one job.
pub mod due;
/// Typed errors.
pub mod error;
/// Job model built from configuration.
pub mod job;
/// Per-bucket exclusive lock.
pub mod lock;
/// Tracing/log initialization helpers.
pub mod logx;
/// Outcome reporting to the monitoring sink.
pub mod report;
/// Persisted success timestamps.
pub mod store;
