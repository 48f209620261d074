//! Benchmark execution engine
//!
//! Runs one strategy at a time, one request in flight, until the
//! throughput estimate is stable or a budget runs out.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::metrics::{Sample, SampleCollector, Throughput};
use super::signal::{Completion, IterationError};
use super::strategy::RequestStrategy;

/// Runner configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Discarded iterations before sampling starts
    pub warmup_iterations: u32,
    /// Samples required before convergence is considered
    pub min_samples: usize,
    /// Relative margin of error (percent) at which sampling stops
    pub target_rme: f64,
    /// Sampling time budget per strategy, seconds
    pub max_time_secs: f64,
    /// Optional completed-iteration budget per strategy
    pub max_iterations: Option<u64>,
    /// Shortest batch worth timing, milliseconds
    pub min_batch_ms: u64,
    /// Largest batch size
    pub max_batch_size: u64,
    /// How long one request may take to complete, milliseconds
    pub iteration_timeout_ms: u64,
    /// Failed iterations tolerated before the strategy is aborted
    pub max_failures: u64,
    /// Extra attempts for a failed iteration
    pub retries: u32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            warmup_iterations: 1,
            min_samples: 5,
            target_rme: 1.0,
            max_time_secs: 5.0,
            max_iterations: None,
            min_batch_ms: 50,
            max_batch_size: 1000,
            iteration_timeout_ms: 10_000,
            max_failures: 10,
            retries: 0,
        }
    }
}

impl RunnerConfig {
    /// Sampling time budget; unrepresentable values saturate
    pub fn max_time(&self) -> Duration {
        Duration::try_from_secs_f64(self.max_time_secs).unwrap_or(Duration::MAX)
    }

    pub fn min_batch_time(&self) -> Duration {
        Duration::from_millis(self.min_batch_ms)
    }

    pub fn iteration_timeout(&self) -> Duration {
        Duration::from_millis(self.iteration_timeout_ms)
    }

    /// Reject settings the runner cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.min_samples < 2 {
            bail!("min_samples must be at least 2, got {}", self.min_samples);
        }
        if !(self.target_rme > 0.0) {
            bail!("target_rme must be positive, got {}", self.target_rme);
        }
        if !(self.max_time_secs > 0.0) {
            bail!("max_time_secs must be positive, got {}", self.max_time_secs);
        }
        if Duration::try_from_secs_f64(self.max_time_secs).is_err() {
            bail!("max_time_secs is out of range, got {}", self.max_time_secs);
        }
        if self.iteration_timeout_ms == 0 {
            bail!("iteration_timeout_ms must be positive");
        }
        if self.max_batch_size == 0 {
            bail!("max_batch_size must be positive");
        }
        if self.max_failures == 0 {
            bail!("max_failures must be positive");
        }
        if self.max_iterations == Some(0) {
            bail!("max_iterations must be positive when set");
        }
        Ok(())
    }
}

/// Runner state for one strategy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Warming,
    Sampling,
    Converged,
    Aborted,
}

/// Why sampling stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Relative margin of error reached the target
    Converged,
    /// Time budget exhausted
    TimeBudget,
    /// Iteration budget exhausted
    IterationBudget,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Converged => f.write_str("converged"),
            StopReason::TimeBudget => f.write_str("time budget"),
            StopReason::IterationBudget => f.write_str("iteration budget"),
        }
    }
}

/// Why a strategy was aborted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Abort {
    #[error("no completion within {0:?}")]
    Timeout(Duration),

    #[error("{count} iterations failed, last: {last}")]
    TooManyFailures { count: u64, last: String },

    #[error("no iteration completed ({failed} failed, last: {last})")]
    NothingCompleted { failed: u64, last: String },
}

/// Measurement outcome of one strategy
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Completed {
        throughput: Throughput,
        stop: StopReason,
    },
    Failed {
        reason: String,
    },
}

/// Final result for one strategy
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrategyResult {
    pub name: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl StrategyResult {
    pub fn throughput(&self) -> Option<&Throughput> {
        match &self.outcome {
            Outcome::Completed { throughput, .. } => Some(throughput),
            Outcome::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, Outcome::Failed { .. })
    }
}

/// Benchmark runner
pub struct BenchmarkRunner {
    config: RunnerConfig,
}

impl BenchmarkRunner {
    /// Create a new benchmark runner
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Measure `strategy` until it converges, runs out of budget or aborts
    pub async fn run(&self, strategy: &dyn RequestStrategy) -> StrategyResult {
        let name = strategy.name().to_string();
        let mut phase = Phase::Idle;
        info!("Benchmarking '{}'", name);

        let outcome = match self.measure(strategy, &mut phase).await {
            Ok((throughput, stop)) => {
                info!(
                    "'{}': {:.1} ops/sec ±{:.2}% over {} iterations ({})",
                    name, throughput.ops_per_sec, throughput.rme, throughput.iterations, stop
                );
                Outcome::Completed { throughput, stop }
            }
            Err(abort) => {
                transition(&name, &mut phase, Phase::Aborted);
                warn!("'{}' aborted: {}", name, abort);
                Outcome::Failed {
                    reason: abort.to_string(),
                }
            }
        };

        StrategyResult { name, outcome }
    }

    async fn measure(
        &self,
        strategy: &dyn RequestStrategy,
        phase: &mut Phase,
    ) -> Result<(Throughput, StopReason), Abort> {
        let name = strategy.name();

        transition(name, phase, Phase::Warming);
        let warm_period = self.warm_up(strategy).await?;

        transition(name, phase, Phase::Sampling);
        let started = Instant::now();
        let max_time = self.config.max_time();
        let mut collector = SampleCollector::new();
        let mut batch_size = warm_period.map_or(1, |p| self.batch_size_for(p));
        let mut last_error = None;

        let stop = loop {
            if let Some(max) = self.config.max_iterations {
                batch_size = batch_size.min(max.saturating_sub(collector.iterations()).max(1));
            }

            for _ in 0..batch_size {
                match self.iterate(strategy).await {
                    Ok((elapsed, completion)) => collector.record_success(elapsed, &completion),
                    Err(IterationError::TimedOut(timeout)) => return Err(Abort::Timeout(timeout)),
                    Err(err) => {
                        collector.record_failure();
                        debug!("'{}': iteration failed: {}", name, err);
                        if collector.failed() >= self.config.max_failures {
                            return Err(Abort::TooManyFailures {
                                count: collector.failed(),
                                last: err.to_string(),
                            });
                        }
                        last_error = Some(err.to_string());
                    }
                }

                if started.elapsed() >= max_time {
                    break;
                }
            }

            if let Some(sample) = collector.finish_batch() {
                batch_size = self.batch_size_for(sample.period());
                debug!(
                    "'{}': sample {} of {} iterations in {:?}",
                    name,
                    collector.sample_count(),
                    sample.iterations,
                    sample.elapsed
                );
            }

            let stats = collector.stats();
            if collector.sample_count() >= self.config.min_samples
                && stats.rme <= self.config.target_rme
            {
                break StopReason::Converged;
            }
            if self
                .config
                .max_iterations
                .is_some_and(|max| collector.iterations() >= max)
            {
                break StopReason::IterationBudget;
            }
            if started.elapsed() >= max_time {
                break StopReason::TimeBudget;
            }
        };

        let failed = collector.failed();
        let throughput = collector.finalize().ok_or_else(|| Abort::NothingCompleted {
            failed,
            last: last_error.unwrap_or_else(|| "none".to_string()),
        })?;

        transition(name, phase, Phase::Converged);
        Ok((throughput, stop))
    }

    /// Run the discarded warm-up iterations, returning their mean period
    async fn warm_up(&self, strategy: &dyn RequestStrategy) -> Result<Option<f64>, Abort> {
        let mut total = Duration::ZERO;
        let mut completed = 0u32;

        for _ in 0..self.config.warmup_iterations {
            match self.iterate(strategy).await {
                Ok((elapsed, _)) => {
                    total += elapsed;
                    completed += 1;
                }
                Err(IterationError::TimedOut(timeout)) => return Err(Abort::Timeout(timeout)),
                Err(err) => debug!("'{}': warm-up iteration failed: {}", strategy.name(), err),
            }
        }

        Ok((completed > 0).then(|| Sample::new(total, completed.into()).period()))
    }

    /// One iteration: issue, await completion, retry failures if configured
    async fn iterate(
        &self,
        strategy: &dyn RequestStrategy,
    ) -> Result<(Duration, Completion), IterationError> {
        let mut attempt = 0;
        loop {
            let start = Instant::now();
            let result = strategy
                .execute()
                .wait(self.config.iteration_timeout())
                .await;

            match result {
                Ok(completion) => return Ok((start.elapsed(), completion)),
                Err(err @ IterationError::TimedOut(_)) => return Err(err),
                Err(err) if attempt < self.config.retries => {
                    attempt += 1;
                    debug!(
                        "'{}': retrying after failure ({}/{}): {}",
                        strategy.name(),
                        attempt,
                        self.config.retries,
                        err
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Iterations needed for a batch to last at least `min_batch_time`
    fn batch_size_for(&self, period_secs: f64) -> u64 {
        let max = self.config.max_batch_size;
        if !(period_secs > 0.0) {
            return max;
        }
        let needed = (self.config.min_batch_time().as_secs_f64() / period_secs).ceil();
        if needed >= max as f64 {
            max
        } else {
            (needed as u64).max(1)
        }
    }
}

fn transition(name: &str, phase: &mut Phase, next: Phase) {
    debug!("'{}': {:?} -> {:?}", name, phase, next);
    *phase = next;
}
