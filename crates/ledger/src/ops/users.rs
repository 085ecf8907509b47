use crate::{LedgerError, LedgerStore, LedgerUnit, ResultLedger, UserId};

use super::{Ledger, with_unit};

/// Usernames are stored exactly as given: callers normalise first, so a
/// name with surrounding whitespace is refused rather than silently trimmed.
fn validate_username(username: &str) -> ResultLedger<()> {
    if username.trim().is_empty() {
        return Err(LedgerError::InvalidUsername(
            "user name must not be empty".to_string(),
        ));
    }
    if username.trim() != username {
        return Err(LedgerError::InvalidUsername(
            "user name must not start or end with whitespace".to_string(),
        ));
    }
    Ok(())
}

impl<S: LedgerStore> Ledger<S> {
    /// Register a user together with its starting balance.
    ///
    /// The user row and the balance row are created in the same unit of
    /// work: there is never a user without a balance.
    pub async fn register(&self, username: &str) -> ResultLedger<UserId> {
        self.register_user(username, None).await
    }

    /// Like [`register`](Self::register), also storing `password_hash` in
    /// the same unit of work, so a registered user can always log in.
    pub async fn register_with_password(
        &self,
        username: &str,
        password_hash: &str,
    ) -> ResultLedger<UserId> {
        self.register_user(username, Some(password_hash)).await
    }

    async fn register_user(
        &self,
        username: &str,
        password_hash: Option<&str>,
    ) -> ResultLedger<UserId> {
        validate_username(username)?;
        let id = self
            .run("register", None, move || {
                self.register_attempt(username, password_hash)
            })
            .await?;
        tracing::info!(user = %id, username, "user registered");
        Ok(id)
    }

    async fn register_attempt(
        &self,
        username: &str,
        password_hash: Option<&str>,
    ) -> ResultLedger<UserId> {
        let starting_balance = self.config.starting_balance;
        with_unit!(self, |unit| {
            register_in_unit(&mut unit, username, password_hash, starting_balance).await
        })
    }
}

async fn register_in_unit<U: LedgerUnit>(
    unit: &mut U,
    username: &str,
    password_hash: Option<&str>,
    starting_balance: i64,
) -> ResultLedger<UserId> {
    let id = unit.create_user(username).await?;
    unit.create_balance(id, starting_balance).await?;
    if let Some(password_hash) = password_hash {
        unit.create_credentials(id, password_hash).await?;
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames_are_not_normalised() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("alice smith").is_ok());
        for name in ["", "   ", " carol", "carol\t"] {
            assert!(matches!(
                validate_username(name),
                Err(LedgerError::InvalidUsername(_))
            ));
        }
    }
}
