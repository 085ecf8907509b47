use std::future::Future;

use tokio::time::Instant;

use crate::{LedgerConfig, LedgerError, LedgerStore, LedgerUnit, ResultLedger};

mod purchase;
mod reads;
mod transfer;
mod users;

pub use reads::Info;

/// Run a block inside a unit of work, committing on success and rolling back
/// on error.
macro_rules! with_unit {
    ($self:expr, |$unit:ident| $body:expr) => {{
        let mut $unit = $self.store.begin().await?;
        let result = $body;
        $crate::ops::finish($unit, result).await
    }};
}

pub(crate) use with_unit;

pub(crate) async fn finish<U: LedgerUnit, T>(unit: U, result: ResultLedger<T>) -> ResultLedger<T> {
    match result {
        Ok(value) => {
            unit.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = unit.rollback().await {
                tracing::warn!("rollback after \"{err}\" failed: {rollback_err}");
            }
            Err(err)
        }
    }
}

/// The ledger: balances, transfers and purchases on top of a
/// [`LedgerStore`].
///
/// The ledger keeps no balance in memory; every operation reads what it
/// needs from the store inside its own unit of work.
#[derive(Debug)]
pub struct Ledger<S> {
    store: S,
    config: LedgerConfig,
}

impl<S: LedgerStore> Ledger<S> {
    /// Return a builder for `Ledger`. Help to build the struct.
    pub fn builder() -> LedgerBuilder<S> {
        LedgerBuilder {
            store: None,
            config: LedgerConfig::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Run `attempt` under the retry policy, bounded by `deadline` (or the
    /// configured operation timeout). When the deadline passes, the attempt
    /// in flight is dropped, which rolls its unit of work back.
    async fn run<T, F, Fut>(
        &self,
        operation: &'static str,
        deadline: Option<Instant>,
        attempt: F,
    ) -> ResultLedger<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ResultLedger<T>>,
    {
        let deadline = deadline.unwrap_or_else(|| Instant::now() + self.config.operation_timeout);
        match tokio::time::timeout_at(deadline, self.config.retry.run(operation, attempt)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, "deadline exceeded, unit of work rolled back");
                Err(LedgerError::Timeout)
            }
        }
    }
}

/// The builder for `Ledger`
pub struct LedgerBuilder<S> {
    store: Option<S>,
    config: LedgerConfig,
}

impl<S: LedgerStore> LedgerBuilder<S> {
    /// Pass the required store
    pub fn store(mut self, store: S) -> LedgerBuilder<S> {
        self.store = Some(store);
        self
    }

    pub fn config(mut self, config: LedgerConfig) -> LedgerBuilder<S> {
        self.config = config;
        self
    }

    /// Construct `Ledger`
    pub fn build(self) -> ResultLedger<Ledger<S>> {
        let store = self.store.ok_or_else(|| LedgerError::not_found("store"))?;
        if self.config.starting_balance < 0 {
            return Err(LedgerError::InvalidAmount(
                "starting balance must be >= 0".to_string(),
            ));
        }
        Ok(Ledger {
            store,
            config: self.config,
        })
    }
}
