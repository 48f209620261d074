//! Sequential benchmark suite
//!
//! Strategies run one after another in registration order, so they never
//! compete for the network while being measured.

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use super::report::BenchmarkReport;
use super::runner::BenchmarkRunner;
use super::strategy::RequestStrategy;
use crate::http::Session;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SuiteError {
    #[error("Strategy '{0}' is already registered")]
    DuplicateStrategy(String),
}

/// Ordered list of strategies plus the sessions the run owns
pub struct BenchmarkSuite {
    runner: BenchmarkRunner,
    strategies: Vec<Box<dyn RequestStrategy>>,
    sessions: Vec<Arc<Session>>,
}

impl BenchmarkSuite {
    pub fn new(runner: BenchmarkRunner) -> Self {
        Self {
            runner,
            strategies: Vec::new(),
            sessions: Vec::new(),
        }
    }

    /// Register a strategy; names must be unique
    pub fn add(&mut self, strategy: impl RequestStrategy + 'static) -> Result<(), SuiteError> {
        if self.strategies.iter().any(|s| s.name() == strategy.name()) {
            return Err(SuiteError::DuplicateStrategy(strategy.name().to_string()));
        }
        self.strategies.push(Box::new(strategy));
        Ok(())
    }

    /// Hand over a session that lives until every strategy has run
    pub fn share_session(&mut self, session: Arc<Session>) {
        self.sessions.push(session);
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Run every strategy to completion and collect the report
    pub async fn run(self) -> BenchmarkReport {
        info!(
            "Running {} strategies (target rme {:.2}%, budget {:.1}s each)",
            self.strategies.len(),
            self.runner.config().target_rme,
            self.runner.config().max_time_secs
        );

        let mut results = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            let result = self.runner.run(strategy.as_ref()).await;

            if let Err(err) = strategy.finish() {
                warn!("Failed to release '{}': {}", strategy.name(), err);
            }
            results.push(result);
        }

        for session in &self.sessions {
            if let Err(err) = session.close() {
                warn!("Failed to close session: {}", err);
            }
        }

        BenchmarkReport::new(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::runner::RunnerConfig;
    use crate::benchmark::simulated::{Behavior, SimulatedStrategy};
    use crate::http::{AllowedProtocols, ClientOptions, Endpoint};
    use std::time::Duration;

    /// Shares counters with the suite-owned copy
    struct Probe(Arc<SimulatedStrategy>);

    impl RequestStrategy for Probe {
        fn name(&self) -> &str {
            self.0.name()
        }

        fn execute(&self) -> crate::benchmark::signal::CompletionSignal {
            self.0.execute()
        }

        fn finish(&self) -> Result<(), crate::http::HttpError> {
            self.0.finish()
        }
    }

    fn suite() -> BenchmarkSuite {
        BenchmarkSuite::new(BenchmarkRunner::new(
            RunnerConfig {
                iteration_timeout_ms: 1000,
                ..RunnerConfig::default()
            },
        ))
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn test_new_suite_is_empty() {
        let mut suite = suite();
        assert!(suite.is_empty());
        suite.add(SimulatedStrategy::new("a", ms(1))).unwrap();
        assert!(!suite.is_empty());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut suite = suite();
        suite.add(SimulatedStrategy::new("a", ms(1))).unwrap();
        assert_eq!(
            suite.add(SimulatedStrategy::new("a", ms(2))),
            Err(SuiteError::DuplicateStrategy("a".to_string()))
        );
        assert_eq!(suite.strategies.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ranks_by_latency() {
        let mut suite = suite();
        suite.add(SimulatedStrategy::new("slow", ms(5))).unwrap();
        suite.add(SimulatedStrategy::new("fast", ms(1))).unwrap();
        suite.add(SimulatedStrategy::new("medium", ms(2))).unwrap();

        let report = suite.run().await;
        assert_eq!(report.results.len(), 3);

        let ranked = report.ranked();
        let names: Vec<&str> = ranked.entries.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["fast", "medium", "slow"]);
        assert_eq!(ranked.fastest, Some("fast"));

        let ops = |i: usize| ranked.entries[i].throughput().unwrap().ops_per_sec;
        let slowest = ops(2);
        assert!((ops(0) / slowest - 5.0).abs() < 0.1);
        assert!((ops(1) / slowest - 2.5).abs() < 0.05);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_strategy_reported_failed() {
        let mut suite = suite();
        suite.add(SimulatedStrategy::new("one", ms(1))).unwrap();
        suite
            .add(SimulatedStrategy::new("stuck", ms(1)).with_behavior(Behavior::Hang))
            .unwrap();
        suite.add(SimulatedStrategy::new("two", ms(2))).unwrap();

        let report = suite.run().await;
        let ranked = report.ranked();

        let names: Vec<&str> = ranked.entries.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["one", "two", "stuck"]);
        assert!(ranked.entries[2].is_failed());
        assert!(!ranked.entries[0].is_failed());
        assert!(!ranked.entries[1].is_failed());
        assert_eq!(ranked.fastest, Some("one"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_called_once_per_strategy() {
        let ok = Arc::new(SimulatedStrategy::new("ok", ms(1)));
        let stuck = Arc::new(SimulatedStrategy::new("stuck", ms(1)).with_behavior(Behavior::Hang));

        let mut suite = suite();
        suite.add(Probe(ok.clone())).unwrap();
        suite.add(Probe(stuck.clone())).unwrap();
        suite.run().await;

        assert_eq!(ok.finishes(), 1);
        assert_eq!(stuck.finishes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_sessions_closed_after_run() {
        let endpoint = Endpoint::parse("https://localhost:8081/").unwrap();
        let session = Arc::new(
            Session::open(endpoint, &ClientOptions::new(AllowedProtocols::Http2Only)).unwrap(),
        );

        let mut suite = suite();
        suite.add(SimulatedStrategy::new("a", ms(1))).unwrap();
        suite.share_session(session.clone());
        suite.run().await;

        assert!(session.is_closed());
        assert!(session.close().is_err());
    }
}
