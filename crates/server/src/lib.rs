use api_types::ErrorResponse;
use axum::{Json, http::StatusCode, response::IntoResponse};
use ledger::LedgerError;

pub use credentials::Passwords;
pub use server::{ServerState, router, run, run_with_listener, spawn_with_listener};

mod auth;
mod buy;
mod coins;
mod credentials;
mod info;
mod server;

pub mod types {
    pub mod auth {
        pub use api_types::auth::{AuthRequest, AuthResponse};
    }

    pub mod coins {
        pub use api_types::coins::SendCoinRequest;
    }

    pub mod info {
        pub use api_types::info::{
            CoinHistory, InfoResponse, InventoryItem, ReceivedCoins, SentCoins,
        };
    }
}

#[derive(Debug)]
pub enum ServerError {
    Ledger(LedgerError),
    Unauthorized,
    Generic(String),
    /// A failure of the server itself; the message is logged, not sent.
    Internal(String),
}

fn status_for_ledger_error(err: &LedgerError) -> StatusCode {
    if err.is_rejection() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn message_for_ledger_error(err: LedgerError) -> String {
    if err.is_rejection() {
        return err.to_string();
    }
    tracing::error!("ledger error: {err}");
    "internal server error".to_string()
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, errors) = match self {
            ServerError::Ledger(err) => (status_for_ledger_error(&err), message_for_ledger_error(err)),
            ServerError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
            ServerError::Internal(err) => {
                tracing::error!("internal error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { errors })).into_response()
    }
}

impl From<LedgerError> for ServerError {
    fn from(value: LedgerError) -> Self {
        Self::Ledger(value)
    }
}
