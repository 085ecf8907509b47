//! Conflict/retry policy.
//!
//! An attempt runs one whole unit of work, from `begin` to `commit`. Its
//! result is classified into an [`Outcome`]; only
//! [`Outcome::AbortedRetryable`] leads to another attempt, with the same
//! inputs, after a short linear backoff. Nothing is visible before commit,
//! so re-running an aborted attempt is safe.

use std::{future::Future, time::Duration};

use crate::{LedgerError, ResultLedger};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(10);

/// How an attempt ended.
#[derive(Debug, PartialEq)]
pub enum Outcome<T> {
    Committed(T),
    /// The store detected a serialization failure or deadlock.
    AbortedRetryable,
    AbortedFatal(LedgerError),
}

impl<T> From<ResultLedger<T>> for Outcome<T> {
    fn from(result: ResultLedger<T>) -> Self {
        match result {
            Ok(value) => Self::Committed(value),
            Err(LedgerError::Conflict) => Self::AbortedRetryable,
            Err(err) => Self::AbortedFatal(err),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included. Zero behaves as one.
    pub max_attempts: u32,
    /// Wait before attempt `n + 1` is `backoff * n`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Run `attempt` until it commits, fails for good, or the attempt budget
    /// is spent. An exhausted budget surfaces as [`LedgerError::Conflict`].
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> ResultLedger<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ResultLedger<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut tries = 0;
        loop {
            tries += 1;
            match Outcome::from(attempt().await) {
                Outcome::Committed(value) => return Ok(value),
                Outcome::AbortedFatal(err) => return Err(err),
                Outcome::AbortedRetryable if tries < max_attempts => {
                    tracing::debug!(operation, attempt = tries, "conflict detected, retrying");
                    tokio::time::sleep(self.backoff * tries).await;
                }
                Outcome::AbortedRetryable => {
                    tracing::warn!(operation, attempts = tries, "conflict retries exhausted");
                    return Err(LedgerError::Conflict);
                }
            }
        }
    }
}
