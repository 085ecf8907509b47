//! Catalog items.
//!
//! Read-only from the ledger's point of view: the catalog is provisioned by
//! migrations.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::ItemId;

/// A catalog entry that can be bought with coins.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub price: i64,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub name: String,
    pub price: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::inventory::Entity")]
    Inventory,
}

impl Related<super::inventory::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Inventory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Item {
    fn from(value: Model) -> Self {
        Self {
            id: ItemId::new(value.id),
            name: value.name,
            price: value.price,
        }
    }
}
