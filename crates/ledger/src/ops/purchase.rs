use crate::{LedgerError, LedgerStore, LedgerUnit, PurchaseCmd, ResultLedger};

use super::{Ledger, with_unit};

impl<S: LedgerStore> Ledger<S> {
    /// Spend coins on one unit of a catalog item.
    ///
    /// The price is read in the same unit of work that charges it, after the
    /// buyer's balance row is locked.
    pub async fn purchase(&self, cmd: PurchaseCmd) -> ResultLedger<()> {
        let cmd = &cmd;
        self.run("purchase", cmd.deadline, move || self.purchase_attempt(cmd))
            .await?;
        tracing::debug!(
            user = %cmd.actor.user_id(),
            item = cmd.item.as_str(),
            "purchase committed"
        );
        Ok(())
    }

    async fn purchase_attempt(&self, cmd: &PurchaseCmd) -> ResultLedger<()> {
        with_unit!(self, |unit| purchase_in_unit(&mut unit, cmd).await)
    }
}

async fn purchase_in_unit<U: LedgerUnit>(unit: &mut U, cmd: &PurchaseCmd) -> ResultLedger<()> {
    let user = cmd.actor.user_id();
    let balance = unit
        .lock_balance(user)
        .await?
        .ok_or_else(|| LedgerError::not_found("user"))?;
    let item = unit
        .item(&cmd.item)
        .await?
        .ok_or_else(|| LedgerError::not_found("item"))?;
    if balance < item.price {
        return Err(LedgerError::NotEnoughCoins);
    }

    unit.record_purchase(user, item.id).await?;
    unit.apply_delta(user, -item.price).await?;
    Ok(())
}
