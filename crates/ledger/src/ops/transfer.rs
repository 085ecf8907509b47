use crate::{LedgerError, LedgerStore, LedgerUnit, ResultLedger, TransferCmd, UserId};

use super::{Ledger, with_unit};

impl<S: LedgerStore> Ledger<S> {
    /// Move coins from the actor to another user.
    ///
    /// Both balance rows are locked in ascending user-id order, so two
    /// transfers running in opposite directions between the same users wait
    /// for each other instead of deadlocking. Every rejection is detected
    /// before anything is written.
    pub async fn transfer(&self, cmd: TransferCmd) -> ResultLedger<()> {
        let cmd = &cmd;
        self.run("transfer", cmd.deadline, move || self.transfer_attempt(cmd))
            .await?;
        tracing::debug!(
            sender = %cmd.actor.user_id(),
            receiver = cmd.receiver.as_str(),
            amount = cmd.amount,
            "transfer committed"
        );
        Ok(())
    }

    async fn transfer_attempt(&self, cmd: &TransferCmd) -> ResultLedger<()> {
        with_unit!(self, |unit| transfer_in_unit(&mut unit, cmd).await)
    }
}

async fn transfer_in_unit<U: LedgerUnit>(unit: &mut U, cmd: &TransferCmd) -> ResultLedger<()> {
    let sender = cmd.actor.user_id();

    let Some(receiver) = unit.user_id(&cmd.receiver).await? else {
        // A missing sender balance is reported first: it is a data defect,
        // not a caller mistake.
        if unit.lock_balance(sender).await?.is_none() {
            return Err(LedgerError::not_found("sender user"));
        }
        return Err(LedgerError::not_found("receiver user"));
    };
    if receiver == sender {
        return Err(LedgerError::SendToYourself);
    }
    if cmd.amount <= 0 {
        return Err(LedgerError::InvalidAmount(
            "amount to send should be positive".to_string(),
        ));
    }

    let mut sender_balance = None;
    let mut receiver_found = false;
    for user in lock_order(sender, receiver) {
        let balance = unit.lock_balance(user).await?;
        if user == sender {
            sender_balance = balance;
        } else {
            receiver_found = balance.is_some();
        }
    }
    let sender_balance = sender_balance.ok_or_else(|| LedgerError::not_found("sender user"))?;
    if !receiver_found {
        return Err(LedgerError::not_found("receiver user"));
    }
    if sender_balance < cmd.amount {
        return Err(LedgerError::NotEnoughCoins);
    }

    unit.record_transfer(sender, receiver, cmd.amount).await?;
    unit.apply_delta(sender, -cmd.amount).await?;
    unit.apply_delta(receiver, cmd.amount).await?;
    Ok(())
}

/// Balance rows are always locked lowest user id first.
fn lock_order(a: UserId, b: UserId) -> [UserId; 2] {
    if a <= b { [a, b] } else { [b, a] }
}
