//! Login-or-register endpoint.

use api_types::auth::{AuthRequest, AuthResponse};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use ledger::{LedgerError, UserId};

use crate::{
    ServerError,
    credentials::{self, MAX_PASSWORD_BYTES},
    server::ServerState,
};

/// Log in, registering the user on first use.
///
/// An unknown username is registered with the ledger's starting balance and
/// the given password; a known one must present its password. The username
/// is trimmed once here, and the token carries the trimmed name.
pub async fn login(
    State(state): State<ServerState>,
    payload: Result<Json<AuthRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ServerError> {
    let Json(payload) = payload.map_err(|err| ServerError::Generic(err.body_text()))?;
    let username = payload.username.trim();
    let password = payload.password.as_str();
    if username.is_empty() || password.is_empty() {
        return Err(ServerError::Generic(
            "username and password are required".to_string(),
        ));
    }
    // Basic credentials split at the first colon.
    if username.contains(':') {
        return Err(ServerError::Generic(
            "username must not contain ':'".to_string(),
        ));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(ServerError::Generic(format!(
            "password must be at most {MAX_PASSWORD_BYTES} bytes"
        )));
    }

    match state.ledger.find_user(username).await? {
        Some(user) => check_password(&state, user.id, password).await?,
        None => {
            let password_hash = state.passwords.hash(password).await?;
            match state
                .ledger
                .register_with_password(username, &password_hash)
                .await
            {
                Ok(_) => {}
                // Someone registered the same name in the meantime: log in instead.
                Err(LedgerError::ExistingKey(_)) => {
                    let user = state
                        .ledger
                        .find_user(username)
                        .await?
                        .ok_or(ServerError::Unauthorized)?;
                    check_password(&state, user.id, password).await?;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    Ok(Json(AuthResponse {
        token: credentials::token(username, password),
    }))
}

pub(crate) async fn check_password(
    state: &ServerState,
    user: UserId,
    password: &str,
) -> Result<(), ServerError> {
    let password_hash = state
        .ledger
        .password_hash(user)
        .await?
        .ok_or(ServerError::Unauthorized)?;
    if !state.passwords.verify(password, &password_hash).await? {
        return Err(ServerError::Unauthorized);
    }
    Ok(())
}
