//! Store capability set used by the ledger.
//!
//! [`LedgerStore`] opens units of work and serves the read-only projections;
//! [`LedgerUnit`] is one atomic unit of work. Ledger operations are written
//! against these traits only, so the relational store and the in-memory
//! store are interchangeable.

use async_trait::async_trait;

use crate::{CoinHistory, Info, InventoryLine, Item, ItemId, ResultLedger, User, UserId};

mod memory;
mod sql;

pub use memory::{MemoryStore, MemoryUnit};
pub use sql::{SeaOrmStore, SeaOrmUnit};

#[async_trait]
pub trait LedgerStore: Send + Sync {
    type Unit: LedgerUnit;

    /// Open a new atomic unit of work.
    async fn begin(&self) -> ResultLedger<Self::Unit>;

    /// Committed balance of `user`, without locking.
    async fn balance(&self, user: UserId) -> ResultLedger<Option<i64>>;

    /// Items owned by `user`, ordered by item name.
    async fn inventory(&self, user: UserId) -> ResultLedger<Vec<InventoryLine>>;

    /// Transfers involving `user`, oldest first.
    async fn history(&self, user: UserId) -> ResultLedger<CoinHistory>;

    /// Balance, inventory and history of `user` read from one consistent
    /// snapshot; `None` if the user has no balance.
    async fn info(&self, user: UserId) -> ResultLedger<Option<Info>>;

    async fn find_user(&self, username: &str) -> ResultLedger<Option<User>>;

    /// Stored password hash of `user`, if any.
    async fn password_hash(&self, user: UserId) -> ResultLedger<Option<String>>;
}

/// One atomic unit of work.
///
/// Effects become visible to other units only through [`commit`]. Dropping a
/// unit, or calling [`rollback`], discards them and releases its locks.
///
///  [`commit`]: LedgerUnit::commit
///  [`rollback`]: LedgerUnit::rollback
#[async_trait]
pub trait LedgerUnit: Send + Sized {
    /// Read `user`'s balance and hold an exclusive lock on the row until the
    /// unit ends. Concurrent lockers of the same row wait. Nothing is locked
    /// when the row does not exist.
    async fn lock_balance(&mut self, user: UserId) -> ResultLedger<Option<i64>>;

    /// Add `delta` to `user`'s balance. The caller must hold the row lock and
    /// must have checked that the result stays non-negative.
    async fn apply_delta(&mut self, user: UserId, delta: i64) -> ResultLedger<()>;

    /// Create the balance row of a freshly created user.
    async fn create_balance(&mut self, user: UserId, balance: i64) -> ResultLedger<()>;

    /// Create a user; fails with `ExistingKey` if the username is taken.
    async fn create_user(&mut self, username: &str) -> ResultLedger<UserId>;

    /// Store the password hash of a freshly created user.
    async fn create_credentials(&mut self, user: UserId, password_hash: &str) -> ResultLedger<()>;

    async fn user_id(&mut self, username: &str) -> ResultLedger<Option<UserId>>;

    /// Catalog lookup by item name.
    async fn item(&mut self, name: &str) -> ResultLedger<Option<Item>>;

    /// Append one transfer record.
    async fn record_transfer(
        &mut self,
        sender: UserId,
        receiver: UserId,
        amount: i64,
    ) -> ResultLedger<()>;

    /// Add one unit of `item` to `user`'s inventory.
    async fn record_purchase(&mut self, user: UserId, item: ItemId) -> ResultLedger<()>;

    async fn commit(self) -> ResultLedger<()>;

    async fn rollback(self) -> ResultLedger<()>;
}
