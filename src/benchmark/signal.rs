//! Single-shot request completion
//!
//! Every strategy reports "response fully drained" through the same
//! `CompletionSignal`, whatever the underlying transport event was.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::http::{DrainedResponse, HttpError};

/// What a settled request produced
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Completion {
    /// Body bytes read and discarded
    pub body_bytes: u64,
    /// Protocol the response arrived over, when known
    pub protocol: Option<String>,
}

impl From<DrainedResponse> for Completion {
    fn from(drained: DrainedResponse) -> Self {
        Self {
            body_bytes: drained.body_bytes,
            protocol: Some(drained.version),
        }
    }
}

/// Why an iteration did not complete
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IterationError {
    #[error("{0}")]
    Failed(#[from] HttpError),

    #[error("no completion within {0:?}")]
    TimedOut(Duration),

    #[error("request was abandoned before its response was drained")]
    Abandoned,
}

type Outcome = Result<Completion, HttpError>;

/// Sending half; consumed by `fire`, so it can fire at most once
#[derive(Debug)]
pub struct CompletionSender {
    tx: oneshot::Sender<Outcome>,
}

impl CompletionSender {
    pub fn fire(self, outcome: Outcome) {
        // The receiver is gone only when the runner already gave up
        let _ = self.tx.send(outcome);
    }
}

/// Receiving half, awaited by the runner
#[derive(Debug)]
pub struct CompletionSignal {
    rx: oneshot::Receiver<Outcome>,
    task: Option<JoinHandle<()>>,
}

impl CompletionSignal {
    pub fn channel() -> (CompletionSender, CompletionSignal) {
        let (tx, rx) = oneshot::channel();
        (CompletionSender { tx }, CompletionSignal { rx, task: None })
    }

    /// Drive `request` on its own task and fire once it resolves.
    ///
    /// The task belongs to the signal: dropping the signal cancels it,
    /// which drops any half-read response.
    pub fn spawn<F>(request: F) -> Self
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        let (sender, mut signal) = Self::channel();
        signal.task = Some(tokio::spawn(async move {
            sender.fire(request.await);
        }));
        signal
    }

    /// A signal that has already settled with `outcome`
    pub fn ready(outcome: Outcome) -> Self {
        let (sender, signal) = Self::channel();
        sender.fire(outcome);
        signal
    }

    /// Wait for the signal, giving up after `timeout`
    pub async fn wait(mut self, timeout: Duration) -> Result<Completion, IterationError> {
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(outcome)) => outcome.map_err(IterationError::from),
            Ok(Err(_)) => Err(IterationError::Abandoned),
            Err(_) => Err(IterationError::TimedOut(timeout)),
        }
    }
}

impl Drop for CompletionSignal {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
