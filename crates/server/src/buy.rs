use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
};
use ledger::{Actor, PurchaseCmd};

use crate::{ServerError, server::ServerState};

/// Buy one unit of `item` for the caller.
pub async fn buy(
    Extension(actor): Extension<Actor>,
    State(state): State<ServerState>,
    Path(item): Path<String>,
) -> Result<StatusCode, ServerError> {
    state.ledger.purchase(PurchaseCmd::new(actor, item)).await?;
    Ok(StatusCode::OK)
}
