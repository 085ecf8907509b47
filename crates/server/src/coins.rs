use api_types::coins::SendCoinRequest;
use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use ledger::{Actor, TransferCmd};

use crate::{ServerError, server::ServerState};

/// Send coins from the caller to another user.
pub async fn send(
    Extension(actor): Extension<Actor>,
    State(state): State<ServerState>,
    payload: Result<Json<SendCoinRequest>, JsonRejection>,
) -> Result<StatusCode, ServerError> {
    let Json(payload) = payload.map_err(|err| ServerError::Generic(err.body_text()))?;
    if payload.to_user.is_empty() {
        return Err(ServerError::Generic("empty toUser field".to_string()));
    }
    if payload.amount <= 0 {
        return Err(ServerError::Generic(
            "amount to send should be positive".to_string(),
        ));
    }

    state
        .ledger
        .transfer(TransferCmd::new(actor, payload.to_user, payload.amount))
        .await?;

    Ok(StatusCode::OK)
}
