//! Seed the merch catalog.

use sea_orm_migration::prelude::*;

use super::m20250210_000000_init::Items;

#[derive(DeriveMigrationName)]
pub struct Migration;

const CATALOG: [(&str, i64); 10] = [
    ("t-shirt", 80),
    ("cup", 20),
    ("book", 50),
    ("pen", 10),
    ("powerbank", 200),
    ("hoody", 300),
    ("umbrella", 200),
    ("socks", 10),
    ("wallet", 50),
    ("pink-hoody", 500),
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let mut insert = Query::insert()
            .into_table(Items::Table)
            .columns([Items::Name, Items::Price])
            .to_owned();
        for (name, price) in CATALOG {
            insert.values_panic([name.into(), price.into()]);
        }
        insert.on_conflict(OnConflict::column(Items::Name).do_nothing().to_owned());

        manager.exec_stmt(insert).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let names = CATALOG.map(|(name, _)| name);
        manager
            .exec_stmt(
                Query::delete()
                    .from_table(Items::Table)
                    .and_where(Expr::col(Items::Name).is_in(names))
                    .to_owned(),
            )
            .await
    }
}
