//! JSON bodies of the shop HTTP API.

use serde::{Deserialize, Serialize};

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub errors: String,
}

pub mod auth {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AuthRequest {
        pub username: String,
        pub password: String,
    }

    /// `token` is sent back as `Authorization: Basic <token>`.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct AuthResponse {
        pub token: String,
    }
}

pub mod coins {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SendCoinRequest {
        #[serde(default)]
        pub to_user: String,
        #[serde(default)]
        pub amount: i64,
    }
}

pub mod info {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct InfoResponse {
        pub coins: i64,
        pub inventory: Vec<InventoryItem>,
        pub coin_history: CoinHistory,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    pub struct InventoryItem {
        #[serde(rename = "type")]
        pub kind: String,
        pub quantity: i64,
    }

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    pub struct CoinHistory {
        pub received: Vec<ReceivedCoins>,
        pub sent: Vec<SentCoins>,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ReceivedCoins {
        pub from_user: String,
        pub amount: i64,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SentCoins {
        pub to_user: String,
        pub amount: i64,
    }
}
