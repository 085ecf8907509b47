use api_types::info::{CoinHistory, InfoResponse, InventoryItem, ReceivedCoins, SentCoins};
use axum::{Extension, Json, extract::State};
use ledger::Actor;

use crate::{ServerError, server::ServerState};

/// Balance, inventory and coin history of the caller.
pub async fn get(
    Extension(actor): Extension<Actor>,
    State(state): State<ServerState>,
) -> Result<Json<InfoResponse>, ServerError> {
    let info = state.ledger.info(actor.user_id()).await?;

    Ok(Json(InfoResponse {
        coins: info.coins,
        inventory: info
            .inventory
            .into_iter()
            .map(|line| InventoryItem {
                kind: line.item,
                quantity: line.quantity,
            })
            .collect(),
        coin_history: CoinHistory {
            received: info
                .history
                .received
                .into_iter()
                .map(|r| ReceivedCoins {
                    from_user: r.from_user,
                    amount: r.amount,
                })
                .collect(),
            sent: info
                .history
                .sent
                .into_iter()
                .map(|s| SentCoins {
                    to_user: s.to_user,
                    amount: s.amount,
                })
                .collect(),
        },
    }))
}
