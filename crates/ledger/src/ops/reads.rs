//! Read-only projections. They take no locks and never mutate.

use serde::{Deserialize, Serialize};

use crate::{CoinHistory, InventoryLine, LedgerError, LedgerStore, ResultLedger, User, UserId};

use super::Ledger;

/// Everything a user sees about their own account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    pub coins: i64,
    pub inventory: Vec<InventoryLine>,
    pub history: CoinHistory,
}

impl<S: LedgerStore> Ledger<S> {
    pub async fn balance(&self, user: UserId) -> ResultLedger<i64> {
        self.run("balance", None, move || self.store.balance(user))
            .await?
            .ok_or_else(|| LedgerError::not_found("user"))
    }

    /// Owned items, ordered by item name.
    pub async fn inventory(&self, user: UserId) -> ResultLedger<Vec<InventoryLine>> {
        self.run("inventory", None, move || self.store.inventory(user))
            .await
    }

    /// Received and sent transfers, oldest first.
    pub async fn history(&self, user: UserId) -> ResultLedger<CoinHistory> {
        self.run("history", None, move || self.store.history(user))
            .await
    }

    /// Balance, inventory and history read from one snapshot, so `coins`
    /// always matches the history shown next to it.
    pub async fn info(&self, user: UserId) -> ResultLedger<Info> {
        self.run("info", None, move || self.store.info(user))
            .await?
            .ok_or_else(|| LedgerError::not_found("user"))
    }

    pub async fn find_user(&self, username: &str) -> ResultLedger<Option<User>> {
        self.run("find_user", None, move || self.store.find_user(username))
            .await
    }

    pub async fn password_hash(&self, user: UserId) -> ResultLedger<Option<String>> {
        self.run("password_hash", None, move || self.store.password_hash(user))
            .await
    }
}
