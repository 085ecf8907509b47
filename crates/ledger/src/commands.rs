//! Command structs for ledger operations.
//!
//! Each command carries the verified [`Actor`] and, optionally, a deadline.
//! Without a deadline the ledger applies
//! [`LedgerConfig::operation_timeout`](crate::LedgerConfig).

use tokio::time::Instant;

use crate::Actor;

/// Move `amount` coins from the actor to the user named `receiver`.
#[derive(Clone, Debug)]
pub struct TransferCmd {
    pub actor: Actor,
    pub receiver: String,
    pub amount: i64,
    pub deadline: Option<Instant>,
}

impl TransferCmd {
    #[must_use]
    pub fn new(actor: Actor, receiver: impl Into<String>, amount: i64) -> Self {
        Self {
            actor,
            receiver: receiver.into(),
            amount,
            deadline: None,
        }
    }

    #[must_use]
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Buy one unit of the catalog item named `item` for the actor.
#[derive(Clone, Debug)]
pub struct PurchaseCmd {
    pub actor: Actor,
    pub item: String,
    pub deadline: Option<Instant>,
}

impl PurchaseCmd {
    #[must_use]
    pub fn new(actor: Actor, item: impl Into<String>) -> Self {
        Self {
            actor,
            item: item.into(),
            deadline: None,
        }
    }

    #[must_use]
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}
