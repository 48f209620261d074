//! Benchmarking module
//!
//! Request strategies, the convergence runner, the sequential suite and
//! the ranked report comparing them.

mod metrics;
mod report;
mod runner;
mod signal;
mod strategy;
mod suite;

#[cfg(test)]
mod simulated;

pub use report::{ReportFormat, ResultReporter};
pub use runner::{BenchmarkRunner, RunnerConfig};
pub use strategy::{build_catalog, select, Targets, CATALOG};
pub use suite::BenchmarkSuite;
