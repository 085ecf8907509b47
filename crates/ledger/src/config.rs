use std::time::Duration;

use crate::RetryPolicy;

/// Coins granted to every user at registration.
pub const DEFAULT_STARTING_BALANCE: i64 = 1000;

/// Upper bound on a single ledger operation, retries included.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Tunables of a [`Ledger`](crate::Ledger).
#[derive(Clone, Debug)]
pub struct LedgerConfig {
    pub starting_balance: i64,
    pub retry: RetryPolicy,
    /// Deadline applied when a command does not carry its own.
    pub operation_timeout: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            starting_balance: DEFAULT_STARTING_BALANCE,
            retry: RetryPolicy::default(),
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }
}
