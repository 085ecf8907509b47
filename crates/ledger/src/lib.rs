//! Coin ledger.
//!
//! Keeps one coin balance per user and offers the two state-changing
//! operations of the shop: transferring coins between users and spending
//! coins on catalog items. Both run inside a single atomic unit of work
//! against the store, with balance rows locked in ascending user-id order,
//! and are retried transparently on transient store conflicts.
//!
//! The store is reached through the [`LedgerStore`]/[`LedgerUnit`]
//! capability traits; [`SeaOrmStore`] is the relational implementation and
//! [`MemoryStore`] an in-process one.

use std::fmt;

use serde::{Deserialize, Serialize};

pub use commands::{PurchaseCmd, TransferCmd};
pub use config::LedgerConfig;
pub use error::LedgerError;
pub use inventory::InventoryLine;
pub use items::Item;
pub use ops::{Info, Ledger, LedgerBuilder};
pub use retry::{Outcome, RetryPolicy};
pub use store::{LedgerStore, LedgerUnit, MemoryStore, MemoryUnit, SeaOrmStore, SeaOrmUnit};
pub use transactions::{CoinHistory, Received, Sent};
pub use users::User;

pub mod balances;
mod commands;
mod config;
pub mod credentials;
mod error;
pub mod inventory;
pub mod items;
mod ops;
mod retry;
mod store;
pub mod transactions;
pub mod users;

pub type ResultLedger<T> = Result<T, LedgerError>;

/// Store-assigned user identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store-assigned catalog item identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(i64);

impl ItemId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

/// The verified identity of the caller of a ledger operation.
///
/// Only the authentication boundary should build one, after it has checked
/// the caller's credentials. Operations never look the caller up from
/// ambient state: the actor is always passed in explicitly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Actor(UserId);

impl Actor {
    #[must_use]
    pub const fn verified(user_id: UserId) -> Self {
        Self(user_id)
    }

    #[must_use]
    pub const fn user_id(self) -> UserId {
        self.0
    }
}
