//! Initial schema.
//!
//! - `users`: shop accounts
//! - `credentials`: password hashes (PHC strings) for HTTP authentication
//! - `balances`: one coin balance per user, never negative
//! - `items`: the merch catalog
//! - `inventory`: owned items per user, one row per (user, item)
//! - `transactions`: append-only log of coin transfers

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Users {
    Table,
    Id,
    Username,
}

#[derive(Iden)]
enum Credentials {
    Table,
    UserId,
    PasswordHash,
}

#[derive(Iden)]
enum Balances {
    Table,
    UserId,
    Balance,
}

#[derive(Iden)]
pub(crate) enum Items {
    Table,
    Id,
    Name,
    Price,
}

#[derive(Iden)]
enum Inventory {
    Table,
    UserId,
    ItemId,
    Quantity,
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    SenderId,
    ReceiverId,
    Amount,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Users::Username)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Credentials::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Credentials::UserId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Credentials::PasswordHash).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-credentials-user_id")
                            .from(Credentials::Table, Credentials::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Balances::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Balances::UserId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Balances::Balance)
                            .big_integer()
                            .not_null()
                            .check(Expr::col(Balances::Balance).gte(0)),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-balances-user_id")
                            .from(Balances::Table, Balances::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Items::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Items::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Items::Name).string().not_null().unique_key())
                    .col(
                        ColumnDef::new(Items::Price)
                            .big_integer()
                            .not_null()
                            .check(Expr::col(Items::Price).gte(0)),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Inventory::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Inventory::UserId).big_integer().not_null())
                    .col(ColumnDef::new(Inventory::ItemId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Inventory::Quantity)
                            .big_integer()
                            .not_null()
                            .check(Expr::col(Inventory::Quantity).gte(1)),
                    )
                    .primary_key(
                        Index::create()
                            .col(Inventory::UserId)
                            .col(Inventory::ItemId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-inventory-user_id")
                            .from(Inventory::Table, Inventory::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-inventory-item_id")
                            .from(Inventory::Table, Inventory::ItemId)
                            .to(Items::Table, Items::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::SenderId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Transactions::ReceiverId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::Amount)
                            .big_integer()
                            .not_null()
                            .check(Expr::col(Transactions::Amount).gt(0)),
                    )
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .check(
                        Expr::col(Transactions::SenderId)
                            .ne(Expr::col(Transactions::ReceiverId)),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-sender_id")
                            .from(Transactions::Table, Transactions::SenderId)
                            .to(Users::Table, Users::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-receiver_id")
                            .from(Transactions::Table, Transactions::ReceiverId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-sender_id")
                    .table(Transactions::Table)
                    .col(Transactions::SenderId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-receiver_id")
                    .table(Transactions::Table)
                    .col(Transactions::ReceiverId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Inventory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Items::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Balances::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Credentials::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await
    }
}
