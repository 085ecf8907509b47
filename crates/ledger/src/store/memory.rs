//! In-process store.
//!
//! Committed state lives behind a mutex; each unit stages its writes and
//! applies them only on commit. Balance rows are locked with per-user async
//! mutexes whose guards the unit holds until it ends, so two units locking
//! the same rows in opposite orders deadlock exactly as they would against a
//! relational store. Uniqueness of usernames and non-negative balances are
//! checked again at commit, under the state mutex.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc,
        atomic::{AtomicI64, AtomicU32, Ordering},
    },
};

use async_trait::async_trait;
use parking_lot::Mutex;
use sea_orm::DbErr;
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};

use crate::{
    CoinHistory, Info, InventoryLine, Item, ItemId, LedgerError, Received, ResultLedger, Sent, User,
    UserId,
};

use super::{LedgerStore, LedgerUnit};

#[derive(Clone, Debug, PartialEq, Eq)]
struct TransferRow {
    sender: UserId,
    receiver: UserId,
    amount: i64,
}

#[derive(Debug, Default)]
struct State {
    users: BTreeMap<UserId, String>,
    balances: BTreeMap<UserId, i64>,
    items: BTreeMap<String, Item>,
    inventory: BTreeMap<(UserId, ItemId), i64>,
    transfers: Vec<TransferRow>,
    credentials: BTreeMap<UserId, String>,
}

impl State {
    fn user_id(&self, username: &str) -> Option<UserId> {
        self.users
            .iter()
            .find_map(|(id, name)| (name == username).then_some(*id))
    }

    fn username(&self, user: UserId) -> ResultLedger<String> {
        self.users
            .get(&user)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("user"))
    }

    fn inventory(&self, user: UserId) -> ResultLedger<Vec<InventoryLine>> {
        let mut lines = self
            .inventory
            .iter()
            .filter(|((owner, _), _)| *owner == user)
            .map(|((_, item_id), quantity)| -> ResultLedger<InventoryLine> {
                let item = self
                    .items
                    .values()
                    .find(|item| item.id == *item_id)
                    .ok_or_else(|| LedgerError::not_found("item"))?;
                Ok(InventoryLine {
                    item: item.name.clone(),
                    quantity: *quantity,
                })
            })
            .collect::<ResultLedger<Vec<_>>>()?;
        lines.sort_by(|a, b| a.item.cmp(&b.item));
        Ok(lines)
    }

    fn history(&self, user: UserId) -> ResultLedger<CoinHistory> {
        let mut history = CoinHistory::default();
        for row in &self.transfers {
            if row.receiver == user {
                history.received.push(Received {
                    from_user: self.username(row.sender)?,
                    amount: row.amount,
                });
            }
            if row.sender == user {
                history.sent.push(Sent {
                    to_user: self.username(row.receiver)?,
                    amount: row.amount,
                });
            }
        }
        Ok(history)
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: Mutex<State>,
    row_locks: Mutex<HashMap<UserId, Arc<RowLock<()>>>>,
    next_user_id: AtomicI64,
    next_item_id: AtomicI64,
    failing_commits: AtomicU32,
}

impl Inner {
    fn row_lock(&self, user: UserId) -> Arc<RowLock<()>> {
        self.row_locks.lock().entry(user).or_default().clone()
    }
}

/// In-memory [`LedgerStore`].
///
/// Cloning is cheap and clones share the same data.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a catalog item.
    #[must_use]
    pub fn with_item(self, name: &str, price: i64) -> Self {
        let id = ItemId::new(self.inner.next_item_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.inner.state.lock().items.insert(
            name.to_string(),
            Item {
                id,
                name: name.to_string(),
                price,
            },
        );
        self
    }

    /// Make the next `count` commits fail with a conflict, as a store would
    /// on a serialization failure.
    pub fn fail_next_commits(&self, count: u32) {
        self.inner.failing_commits.store(count, Ordering::SeqCst);
    }

    /// Sum of all committed balances.
    #[must_use]
    pub fn total_coins(&self) -> i64 {
        self.inner.state.lock().balances.values().sum()
    }

    /// Number of committed transfer records.
    #[must_use]
    pub fn transfer_count(&self) -> usize {
        self.inner.state.lock().transfers.len()
    }
}

#[derive(Debug, Default)]
struct Pending {
    users: Vec<(UserId, String)>,
    credentials: Vec<(UserId, String)>,
    balances: Vec<(UserId, i64)>,
    deltas: BTreeMap<UserId, i64>,
    transfers: Vec<TransferRow>,
    purchases: Vec<(UserId, ItemId)>,
}

/// A unit of work on a [`MemoryStore`].
pub struct MemoryUnit {
    inner: Arc<Inner>,
    locks: HashMap<UserId, OwnedMutexGuard<()>>,
    pending: Pending,
}

impl MemoryUnit {
    fn staged_balance(&self, state: &State, user: UserId) -> Option<i64> {
        let committed = state.balances.get(&user).copied().or_else(|| {
            self.pending
                .balances
                .iter()
                .find_map(|(id, balance)| (*id == user).then_some(*balance))
        })?;
        Some(committed + self.pending.deltas.get(&user).copied().unwrap_or(0))
    }

    fn staged_user_id(&self, state: &State, username: &str) -> Option<UserId> {
        state.user_id(username).or_else(|| {
            self.pending
                .users
                .iter()
                .find_map(|(id, name)| (name == username).then_some(*id))
        })
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    type Unit = MemoryUnit;

    async fn begin(&self) -> ResultLedger<MemoryUnit> {
        Ok(MemoryUnit {
            inner: Arc::clone(&self.inner),
            locks: HashMap::new(),
            pending: Pending::default(),
        })
    }

    async fn balance(&self, user: UserId) -> ResultLedger<Option<i64>> {
        Ok(self.inner.state.lock().balances.get(&user).copied())
    }

    async fn inventory(&self, user: UserId) -> ResultLedger<Vec<InventoryLine>> {
        self.inner.state.lock().inventory(user)
    }

    async fn history(&self, user: UserId) -> ResultLedger<CoinHistory> {
        self.inner.state.lock().history(user)
    }

    async fn info(&self, user: UserId) -> ResultLedger<Option<Info>> {
        let state = self.inner.state.lock();
        let Some(coins) = state.balances.get(&user).copied() else {
            return Ok(None);
        };
        Ok(Some(Info {
            coins,
            inventory: state.inventory(user)?,
            history: state.history(user)?,
        }))
    }

    async fn find_user(&self, username: &str) -> ResultLedger<Option<User>> {
        let state = self.inner.state.lock();
        Ok(state.user_id(username).map(|id| User {
            id,
            username: username.to_string(),
        }))
    }

    async fn password_hash(&self, user: UserId) -> ResultLedger<Option<String>> {
        Ok(self.inner.state.lock().credentials.get(&user).cloned())
    }
}

#[async_trait]
impl LedgerUnit for MemoryUnit {
    async fn lock_balance(&mut self, user: UserId) -> ResultLedger<Option<i64>> {
        let exists = {
            let state = self.inner.state.lock();
            self.staged_balance(&state, user).is_some()
        };
        if !exists {
            return Ok(None);
        }
        if !self.locks.contains_key(&user) {
            let guard = self.inner.row_lock(user).lock_owned().await;
            self.locks.insert(user, guard);
        }
        let state = self.inner.state.lock();
        Ok(self.staged_balance(&state, user))
    }

    async fn apply_delta(&mut self, user: UserId, delta: i64) -> ResultLedger<()> {
        let exists = {
            let state = self.inner.state.lock();
            self.staged_balance(&state, user).is_some()
        };
        if !exists {
            return Err(LedgerError::not_found("user"));
        }
        *self.pending.deltas.entry(user).or_insert(0) += delta;
        Ok(())
    }

    async fn create_balance(&mut self, user: UserId, balance: i64) -> ResultLedger<()> {
        let state = self.inner.state.lock();
        if self.staged_balance(&state, user).is_some() {
            return Err(LedgerError::ExistingKey(format!("balance of user {user}")));
        }
        drop(state);
        self.pending.balances.push((user, balance));
        Ok(())
    }

    async fn create_user(&mut self, username: &str) -> ResultLedger<UserId> {
        let state = self.inner.state.lock();
        if self.staged_user_id(&state, username).is_some() {
            return Err(LedgerError::ExistingKey(username.to_string()));
        }
        drop(state);
        let id = UserId::new(self.inner.next_user_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.pending.users.push((id, username.to_string()));
        Ok(id)
    }

    async fn create_credentials(&mut self, user: UserId, password_hash: &str) -> ResultLedger<()> {
        self.pending
            .credentials
            .push((user, password_hash.to_string()));
        Ok(())
    }

    async fn user_id(&mut self, username: &str) -> ResultLedger<Option<UserId>> {
        let state = self.inner.state.lock();
        Ok(self.staged_user_id(&state, username))
    }

    async fn item(&mut self, name: &str) -> ResultLedger<Option<Item>> {
        Ok(self.inner.state.lock().items.get(name).cloned())
    }

    async fn record_transfer(
        &mut self,
        sender: UserId,
        receiver: UserId,
        amount: i64,
    ) -> ResultLedger<()> {
        self.pending.transfers.push(TransferRow {
            sender,
            receiver,
            amount,
        });
        Ok(())
    }

    async fn record_purchase(&mut self, user: UserId, item: ItemId) -> ResultLedger<()> {
        self.pending.purchases.push((user, item));
        Ok(())
    }

    async fn commit(self) -> ResultLedger<()> {
        let injected = self
            .inner
            .failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1));
        if injected.is_ok() {
            return Err(LedgerError::Conflict);
        }

        let mut state = self.inner.state.lock();
        // Constraints are checked before anything is written, so a rejected
        // commit leaves the committed state untouched.
        for (_, username) in &self.pending.users {
            if state.user_id(username).is_some() {
                return Err(LedgerError::ExistingKey(username.clone()));
            }
        }
        for user in self.pending.deltas.keys() {
            let balance = self.staged_balance(&state, *user).unwrap_or(0);
            if balance < 0 {
                return Err(LedgerError::Database(DbErr::Custom(format!(
                    "balance check violated for user {user}: {balance}"
                ))));
            }
        }
        for row in &self.pending.transfers {
            if row.sender == row.receiver || row.amount <= 0 {
                return Err(LedgerError::Database(DbErr::Custom(
                    "transaction check violated".to_string(),
                )));
            }
        }

        let Pending {
            users,
            credentials,
            balances,
            deltas,
            transfers,
            purchases,
        } = &self.pending;
        for (id, username) in users {
            state.users.insert(*id, username.clone());
        }
        for (id, password_hash) in credentials {
            state.credentials.insert(*id, password_hash.clone());
        }
        for (id, balance) in balances {
            state.balances.insert(*id, *balance);
        }
        for (user, delta) in deltas {
            *state.balances.entry(*user).or_insert(0) += delta;
        }
        state.transfers.extend(transfers.iter().cloned());
        for key in purchases {
            *state.inventory.entry(*key).or_insert(0) += 1;
        }
        Ok(())
    }

    async fn rollback(self) -> ResultLedger<()> {
        Ok(())
    }
}
