//! Strategy with simulated latency, for exercising the runner and suite
//! without a network

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::signal::{Completion, CompletionSignal};
use super::strategy::RequestStrategy;
use crate::http::HttpError;

#[derive(Clone, Copy, Debug)]
pub enum Behavior {
    /// Complete after the configured latency
    Complete,
    /// Never signal completion
    Hang,
    /// Fail every n-th execution (1-based), complete the others
    FailEvery(u64),
    /// Take the given latency once more than n executions have happened
    SlowAfter(u64, Duration),
}

pub struct SimulatedStrategy {
    name: String,
    latency: Duration,
    behavior: Behavior,
    executions: AtomicU64,
    completions: Arc<AtomicU64>,
    finishes: AtomicU64,
}

impl SimulatedStrategy {
    pub fn new(name: impl Into<String>, latency: Duration) -> Self {
        Self {
            name: name.into(),
            latency,
            behavior: Behavior::Complete,
            executions: AtomicU64::new(0),
            completions: Arc::new(AtomicU64::new(0)),
            finishes: AtomicU64::new(0),
        }
    }

    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::SeqCst)
    }

    /// Successful completions fired so far
    pub fn completions(&self) -> u64 {
        self.completions.load(Ordering::SeqCst)
    }

    pub fn finishes(&self) -> u64 {
        self.finishes.load(Ordering::SeqCst)
    }
}

impl RequestStrategy for SimulatedStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self) -> CompletionSignal {
        let n = self.executions.fetch_add(1, Ordering::SeqCst) + 1;
        let latency = match self.behavior {
            Behavior::SlowAfter(after, slow) if n > after => slow,
            _ => self.latency,
        };
        let completions = self.completions.clone();

        match self.behavior {
            Behavior::Hang => CompletionSignal::spawn(std::future::pending()),
            Behavior::FailEvery(k) if n % k == 0 => CompletionSignal::spawn(async move {
                tokio::time::sleep(latency).await;
                Err(HttpError::ConnectionFailed("simulated".to_string()))
            }),
            _ => CompletionSignal::spawn(async move {
                tokio::time::sleep(latency).await;
                completions.fetch_add(1, Ordering::SeqCst);
                Ok(Completion {
                    body_bytes: 0,
                    protocol: Some("simulated".to_string()),
                })
            }),
        }
    }

    fn finish(&self) -> Result<(), HttpError> {
        self.finishes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
