//! Relational store on top of sea-orm.
//!
//! Every mutating unit uses the same isolation discipline: READ COMMITTED
//! plus an exclusive row lock (`SELECT ... FOR UPDATE`) taken on each
//! balance before it is read. SQLite has no row locks: the statement is
//! issued without the lock clause and the database-level write lock takes
//! its place, with busy/locked errors surfacing as conflicts.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    AccessMode, ActiveValue, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend,
    IsolationLevel, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    prelude::*,
    sea_query::{Expr, OnConflict},
};

use crate::{
    CoinHistory, Info, InventoryLine, Item, ItemId, LedgerError, Received, ResultLedger, Sent, User,
    UserId, balances, credentials, error::is_unique_violation, inventory, items, transactions,
    users,
};

use super::{LedgerStore, LedgerUnit};

#[derive(Clone, Debug)]
pub struct SeaOrmStore {
    database: DatabaseConnection,
}

impl SeaOrmStore {
    #[must_use]
    pub fn new(database: DatabaseConnection) -> Self {
        Self { database }
    }

    #[must_use]
    pub fn database(&self) -> &DatabaseConnection {
        &self.database
    }

    fn isolation_level(&self) -> Option<IsolationLevel> {
        match self.database.get_database_backend() {
            DbBackend::Postgres | DbBackend::MySql => Some(IsolationLevel::ReadCommitted),
            _ => None,
        }
    }

    /// Read-only transaction whose queries all see the same snapshot. SQLite
    /// read transactions already do.
    async fn begin_snapshot(&self) -> ResultLedger<DatabaseTransaction> {
        let db_tx = match self.database.get_database_backend() {
            DbBackend::Postgres | DbBackend::MySql => {
                self.database
                    .begin_with_config(
                        Some(IsolationLevel::RepeatableRead),
                        Some(AccessMode::ReadOnly),
                    )
                    .await?
            }
            _ => self.database.begin().await?,
        };
        Ok(db_tx)
    }
}

/// A unit of work backed by a database transaction. Dropping it rolls the
/// transaction back.
pub struct SeaOrmUnit {
    db_tx: DatabaseTransaction,
}

async fn balance_of<C: ConnectionTrait>(db: &C, user: UserId) -> ResultLedger<Option<i64>> {
    let row = balances::Entity::find_by_id(user.get()).one(db).await?;
    Ok(row.map(|row| row.balance))
}

async fn inventory_of<C: ConnectionTrait>(
    db: &C,
    user: UserId,
) -> ResultLedger<Vec<InventoryLine>> {
    let rows = inventory::Entity::find()
        .filter(inventory::Column::UserId.eq(user.get()))
        .find_also_related(items::Entity)
        .order_by_asc(items::Column::Name)
        .all(db)
        .await?;

    rows.into_iter()
        .map(|(entry, item)| -> ResultLedger<InventoryLine> {
            let item = item.ok_or_else(|| LedgerError::not_found("item"))?;
            Ok(InventoryLine {
                item: item.name,
                quantity: entry.quantity,
            })
        })
        .collect()
}

async fn history_of<C: ConnectionTrait>(db: &C, user: UserId) -> ResultLedger<CoinHistory> {
    let id = user.get();
    let rows = transactions::Entity::find()
        .filter(
            transactions::Column::SenderId
                .eq(id)
                .or(transactions::Column::ReceiverId.eq(id)),
        )
        .order_by_asc(transactions::Column::Id)
        .all(db)
        .await?;

    let counterparts: BTreeSet<i64> = rows
        .iter()
        .map(|row| {
            if row.sender_id == id {
                row.receiver_id
            } else {
                row.sender_id
            }
        })
        .collect();
    let names: HashMap<i64, String> = users::Entity::find()
        .filter(users::Column::Id.is_in(counterparts))
        .all(db)
        .await?
        .into_iter()
        .map(|user| (user.id, user.username))
        .collect();

    let name_of = |user_id: i64| {
        names
            .get(&user_id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("user"))
    };

    let mut history = CoinHistory::default();
    for row in rows {
        if row.receiver_id == id {
            history.received.push(Received {
                from_user: name_of(row.sender_id)?,
                amount: row.amount,
            });
        }
        if row.sender_id == id {
            history.sent.push(Sent {
                to_user: name_of(row.receiver_id)?,
                amount: row.amount,
            });
        }
    }
    Ok(history)
}

#[async_trait]
impl LedgerStore for SeaOrmStore {
    type Unit = SeaOrmUnit;

    async fn begin(&self) -> ResultLedger<SeaOrmUnit> {
        let db_tx = self
            .database
            .begin_with_config(self.isolation_level(), None)
            .await?;
        Ok(SeaOrmUnit { db_tx })
    }

    async fn balance(&self, user: UserId) -> ResultLedger<Option<i64>> {
        balance_of(&self.database, user).await
    }

    async fn inventory(&self, user: UserId) -> ResultLedger<Vec<InventoryLine>> {
        inventory_of(&self.database, user).await
    }

    async fn history(&self, user: UserId) -> ResultLedger<CoinHistory> {
        // Both directions and the counterpart names from the same snapshot.
        let db_tx = self.begin_snapshot().await?;
        let history = history_of(&db_tx, user).await?;
        db_tx.commit().await?;
        Ok(history)
    }

    async fn info(&self, user: UserId) -> ResultLedger<Option<Info>> {
        let db_tx = self.begin_snapshot().await?;
        let Some(coins) = balance_of(&db_tx, user).await? else {
            db_tx.rollback().await?;
            return Ok(None);
        };
        let info = Info {
            coins,
            inventory: inventory_of(&db_tx, user).await?,
            history: history_of(&db_tx, user).await?,
        };
        db_tx.commit().await?;
        Ok(Some(info))
    }

    async fn find_user(&self, username: &str) -> ResultLedger<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.database)
            .await?;
        Ok(user.map(User::from))
    }

    async fn password_hash(&self, user: UserId) -> ResultLedger<Option<String>> {
        let row = credentials::Entity::find_by_id(user.get())
            .one(&self.database)
            .await?;
        Ok(row.map(|row| row.password_hash))
    }
}

#[async_trait]
impl LedgerUnit for SeaOrmUnit {
    async fn lock_balance(&mut self, user: UserId) -> ResultLedger<Option<i64>> {
        let row = balances::Entity::find()
            .filter(balances::Column::UserId.eq(user.get()))
            .lock_exclusive()
            .one(&self.db_tx)
            .await?;
        Ok(row.map(|row| row.balance))
    }

    async fn apply_delta(&mut self, user: UserId, delta: i64) -> ResultLedger<()> {
        let result = balances::Entity::update_many()
            .col_expr(
                balances::Column::Balance,
                Expr::col(balances::Column::Balance).add(delta),
            )
            .filter(balances::Column::UserId.eq(user.get()))
            .exec(&self.db_tx)
            .await?;
        if result.rows_affected != 1 {
            return Err(LedgerError::not_found("user"));
        }
        Ok(())
    }

    async fn create_balance(&mut self, user: UserId, balance: i64) -> ResultLedger<()> {
        balances::ActiveModel {
            user_id: ActiveValue::Set(user.get()),
            balance: ActiveValue::Set(balance),
        }
        .insert(&self.db_tx)
        .await?;
        Ok(())
    }

    async fn create_user(&mut self, username: &str) -> ResultLedger<UserId> {
        let model = users::ActiveModel {
            username: ActiveValue::Set(username.to_string()),
            ..Default::default()
        }
        .insert(&self.db_tx)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                LedgerError::ExistingKey(username.to_string())
            } else {
                LedgerError::from(err)
            }
        })?;
        Ok(UserId::new(model.id))
    }

    async fn create_credentials(&mut self, user: UserId, password_hash: &str) -> ResultLedger<()> {
        credentials::ActiveModel {
            user_id: ActiveValue::Set(user.get()),
            password_hash: ActiveValue::Set(password_hash.to_string()),
        }
        .insert(&self.db_tx)
        .await?;
        Ok(())
    }

    async fn user_id(&mut self, username: &str) -> ResultLedger<Option<UserId>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.db_tx)
            .await?;
        Ok(user.map(|user| UserId::new(user.id)))
    }

    async fn item(&mut self, name: &str) -> ResultLedger<Option<Item>> {
        let item = items::Entity::find()
            .filter(items::Column::Name.eq(name))
            .one(&self.db_tx)
            .await?;
        Ok(item.map(Item::from))
    }

    async fn record_transfer(
        &mut self,
        sender: UserId,
        receiver: UserId,
        amount: i64,
    ) -> ResultLedger<()> {
        transactions::ActiveModel {
            sender_id: ActiveValue::Set(sender.get()),
            receiver_id: ActiveValue::Set(receiver.get()),
            amount: ActiveValue::Set(amount),
            created_at: ActiveValue::Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db_tx)
        .await?;
        Ok(())
    }

    async fn record_purchase(&mut self, user: UserId, item: ItemId) -> ResultLedger<()> {
        let entry = inventory::ActiveModel {
            user_id: ActiveValue::Set(user.get()),
            item_id: ActiveValue::Set(item.get()),
            quantity: ActiveValue::Set(1),
        };
        inventory::Entity::insert(entry)
            .on_conflict(
                OnConflict::columns([inventory::Column::UserId, inventory::Column::ItemId])
                    .value(
                        inventory::Column::Quantity,
                        Expr::col((inventory::Entity, inventory::Column::Quantity)).add(1),
                    )
                    .to_owned(),
            )
            .exec_without_returning(&self.db_tx)
            .await?;
        Ok(())
    }

    async fn commit(self) -> ResultLedger<()> {
        self.db_tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> ResultLedger<()> {
        self.db_tx.rollback().await?;
        Ok(())
    }
}
