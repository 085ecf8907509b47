//! The module contains the errors the ledger can return.
//!
//! Business-rule rejections ([`RecordNotFound`], [`NotEnoughCoins`],
//! [`SendToYourself`], [`InvalidAmount`], [`InvalidUsername`],
//! [`ExistingKey`]) are always
//! detected before the unit of work commits. [`Conflict`] is produced by the
//! store on serialization failures and deadlocks and only escapes the ledger
//! once the retry budget is spent.
//!
//!  [`RecordNotFound`]: LedgerError::RecordNotFound
//!  [`NotEnoughCoins`]: LedgerError::NotEnoughCoins
//!  [`SendToYourself`]: LedgerError::SendToYourself
//!  [`InvalidAmount`]: LedgerError::InvalidAmount
//!  [`InvalidUsername`]: LedgerError::InvalidUsername
//!  [`ExistingKey`]: LedgerError::ExistingKey
//!  [`Conflict`]: LedgerError::Conflict
use sea_orm::{DbErr, RuntimeErr, SqlErr};
use thiserror::Error;

/// Ledger custom errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("{0}: record not found")]
    RecordNotFound(String),
    #[error("not enough coins")]
    NotEnoughCoins,
    #[error("can't send coins to yourself")]
    SendToYourself,
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid user name: {0}")]
    InvalidUsername(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("concurrent update conflict, retries exhausted")]
    Conflict,
    #[error("operation deadline exceeded")]
    Timeout,
    #[error(transparent)]
    Database(DbErr),
}

impl LedgerError {
    pub(crate) fn not_found(label: &str) -> Self {
        Self::RecordNotFound(label.to_string())
    }

    /// Whether the error rejects the caller's request, as opposed to a
    /// failure of the ledger or its store.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        match self {
            Self::RecordNotFound(_)
            | Self::NotEnoughCoins
            | Self::SendToYourself
            | Self::InvalidAmount(_)
            | Self::InvalidUsername(_)
            | Self::ExistingKey(_) => true,
            Self::Conflict | Self::Timeout | Self::Database(_) => false,
        }
    }
}

impl From<DbErr> for LedgerError {
    fn from(err: DbErr) -> Self {
        if is_transient(&err) {
            tracing::debug!("store reported a transient conflict: {err}");
            return Self::Conflict;
        }
        Self::Database(err)
    }
}

/// PostgreSQL serialization failure / deadlock, SQLite busy / locked
/// (including the extended result codes).
const TRANSIENT_CODES: [&str; 7] = ["40001", "40P01", "5", "6", "261", "262", "517"];

fn is_transient(err: &DbErr) -> bool {
    let runtime = match err {
        DbErr::Exec(runtime) | DbErr::Query(runtime) | DbErr::Conn(runtime) => runtime,
        _ => return false,
    };
    match runtime {
        RuntimeErr::SqlxError(sqlx_err) => sqlx_err
            .as_database_error()
            .and_then(|db_err| db_err.code())
            .is_some_and(|code| TRANSIENT_CODES.contains(&&*code)),
        RuntimeErr::Internal(message) => message.contains("database is locked"),
        #[allow(unreachable_patterns)]
        _ => false,
    }
}

/// Whether the store rejected a write because of a unique constraint.
pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

impl PartialEq for LedgerError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::RecordNotFound(a), Self::RecordNotFound(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidUsername(a), Self::InvalidUsername(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::NotEnoughCoins, Self::NotEnoughCoins)
            | (Self::SendToYourself, Self::SendToYourself)
            | (Self::Conflict, Self::Conflict)
            | (Self::Timeout, Self::Timeout) => true,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
