use axum::{
    Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Basic},
    typed_header::TypedHeaderRejection,
};
use ledger::{Actor, Ledger, SeaOrmStore};

use std::sync::Arc;

use crate::{ServerError, auth, buy, coins, credentials::Passwords, info};

#[derive(Clone)]
pub struct ServerState {
    pub ledger: Arc<Ledger<SeaOrmStore>>,
    pub passwords: Passwords,
}

impl ServerState {
    pub fn new(ledger: Ledger<SeaOrmStore>) -> Self {
        Self {
            ledger: Arc::new(ledger),
            passwords: Passwords::default(),
        }
    }

    /// Replace the default argon2 cost.
    pub fn passwords(mut self, passwords: Passwords) -> Self {
        self.passwords = passwords;
        self
    }
}

/// Check the Basic credentials of the request and attach the verified
/// [`Actor`] to it.
async fn authenticate(
    State(state): State<ServerState>,
    auth_header: Result<TypedHeader<Authorization<Basic>>, TypedHeaderRejection>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let Ok(TypedHeader(auth_header)) = auth_header else {
        return Err(ServerError::Unauthorized);
    };
    if auth_header.username().is_empty() || auth_header.password().is_empty() {
        return Err(ServerError::Unauthorized);
    }

    let user = state
        .ledger
        .find_user(auth_header.username())
        .await?
        .ok_or(ServerError::Unauthorized)?;
    auth::check_password(&state, user.id, auth_header.password()).await?;

    request.extensions_mut().insert(Actor::verified(user.id));
    Ok(next.run(request).await)
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/api/info", get(info::get))
        .route("/api/sendCoin", post(coins::send))
        .route("/api/buy/{item}", get(buy::buy))
        .route_layer(middleware::from_fn_with_state(state.clone(), authenticate))
        .route("/api/auth", post(auth::login))
        .with_state(state)
}

pub async fn run(ledger: Ledger<SeaOrmStore>, addr: &str) {
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener on {addr}: {err}");
            return;
        }
    };
    if let Err(err) = run_with_listener(ledger, listener).await {
        tracing::error!("server failed: {err}");
    }
}

pub async fn run_with_listener(
    ledger: Ledger<SeaOrmStore>,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router(ServerState::new(ledger))).await
}

pub fn spawn_with_listener(
    ledger: Ledger<SeaOrmStore>,
    listener: tokio::net::TcpListener,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(ledger, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}
