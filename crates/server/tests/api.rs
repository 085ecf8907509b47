use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use ledger::{Ledger, SeaOrmStore};
use migration::MigratorTrait;
use sea_orm::Database;
use serde_json::{Value, json};
use server::{Passwords, ServerState};
use tower::ServiceExt;

async fn app() -> Router {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let ledger = Ledger::builder()
        .store(SeaOrmStore::new(db))
        .build()
        .unwrap();
    let state = ServerState::new(ledger).passwords(Passwords::with_cost(1024, 1).unwrap());
    server::router(state)
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Basic {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Basic {token}"))
        .body(Body::empty())
        .unwrap()
}

async fn login(app: &Router, username: &str, password: &str) -> String {
    let (status, body) = call(
        app,
        post_json(
            "/api/auth",
            None,
            json!({"username": username, "password": password}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

async fn info(app: &Router, token: &str) -> Value {
    let (status, body) = call(app, get("/api/info", token)).await;
    assert_eq!(status, StatusCode::OK);
    body
}

#[tokio::test]
async fn first_login_registers_with_starting_balance() {
    let app = app().await;
    let token = login(&app, "alice", "secret").await;

    assert_eq!(
        info(&app, &token).await,
        json!({
            "coins": 1000,
            "inventory": [],
            "coinHistory": {"received": [], "sent": []},
        })
    );
    assert_eq!(login(&app, "alice", "secret").await, token);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let app = app().await;
    login(&app, "alice", "secret").await;

    let (status, body) = call(
        &app,
        post_json(
            "/api/auth",
            None,
            json!({"username": "alice", "password": "guess"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["errors"], "unauthorized");
}

#[tokio::test]
async fn protected_routes_need_valid_credentials() {
    let app = app().await;
    login(&app, "alice", "secret").await;

    let request = Request::builder()
        .uri("/api/info")
        .body(Body::empty())
        .unwrap();
    let (status, _) = call(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // "alice:guess"
    let (status, _) = call(&app, get("/api/info", "YWxpY2U6Z3Vlc3M=")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // "bob:secret", never registered
    let (status, _) = call(&app, get("/api/info", "Ym9iOnNlY3JldA==")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn auth_rejects_malformed_bodies() {
    let app = app().await;

    let (status, _) = call(
        &app,
        post_json("/api/auth", None, json!({"username": "alice"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app,
        post_json(
            "/api/auth",
            None,
            json!({"username": "", "password": "secret"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn usernames_are_trimmed_once_at_login() {
    let app = app().await;
    let token = login(&app, " carol", "pw").await;

    // "carol:pw"
    assert_eq!(token, "Y2Fyb2w6cHc=");
    assert_eq!(info(&app, &token).await["coins"], 1000);
    assert_eq!(login(&app, " carol", "pw").await, token);
    assert_eq!(login(&app, "carol ", "pw").await, token);
    assert_eq!(login(&app, "carol", "pw").await, token);

    // still one account: the balance was not granted twice
    let bob = login(&app, "bob", "hunter2").await;
    let (status, _) = call(
        &app,
        post_json(
            "/api/sendCoin",
            Some(&bob),
            json!({"toUser": "carol", "amount": 10}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info(&app, &token).await["coins"], 1010);
}

#[tokio::test]
async fn usernames_with_a_colon_are_rejected() {
    let app = app().await;

    let (status, body) = call(
        &app,
        post_json(
            "/api/auth",
            None,
            json!({"username": "dan:x", "password": "pw"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"], "username must not contain ':'");

    // nothing was registered under either half
    let (status, _) = call(&app, get("/api/info", "ZGFuOng6cHc=")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn overlong_passwords_are_rejected() {
    let app = app().await;

    let (status, _) = call(
        &app,
        post_json(
            "/api/auth",
            None,
            json!({"username": "erin", "password": "x".repeat(73)}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    login(&app, "erin", &"x".repeat(72)).await;
}

#[tokio::test]
async fn buying_updates_balance_and_inventory() {
    let app = app().await;
    let token = login(&app, "alice", "secret").await;

    let (status, _) = call(&app, get("/api/buy/cup", &token)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, get("/api/buy/cup", &token)).await;
    assert_eq!(status, StatusCode::OK);

    let body = info(&app, &token).await;
    assert_eq!(body["coins"], 960);
    assert_eq!(body["inventory"], json!([{"type": "cup", "quantity": 2}]));
}

#[tokio::test]
async fn buying_unknown_or_unaffordable_items_fails() {
    let app = app().await;
    let token = login(&app, "alice", "secret").await;

    let (status, body) = call(&app, get("/api/buy/yacht", &token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"], "item: record not found");

    for _ in 0..2 {
        let (status, _) = call(&app, get("/api/buy/pink-hoody", &token)).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = call(&app, get("/api/buy/pink-hoody", &token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"], "not enough coins");
    assert_eq!(info(&app, &token).await["coins"], 0);
}

#[tokio::test]
async fn sending_coins_shows_up_on_both_sides() {
    let app = app().await;
    let alice = login(&app, "alice", "secret").await;
    let bob = login(&app, "bob", "hunter2").await;

    let (status, body) = call(
        &app,
        post_json(
            "/api/sendCoin",
            Some(&alice),
            json!({"toUser": "bob", "amount": 100}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);

    let alice_info = info(&app, &alice).await;
    assert_eq!(alice_info["coins"], 900);
    assert_eq!(
        alice_info["coinHistory"],
        json!({"received": [], "sent": [{"toUser": "bob", "amount": 100}]})
    );

    let bob_info = info(&app, &bob).await;
    assert_eq!(bob_info["coins"], 1100);
    assert_eq!(
        bob_info["coinHistory"],
        json!({"received": [{"fromUser": "alice", "amount": 100}], "sent": []})
    );
}

#[tokio::test]
async fn invalid_transfers_are_bad_requests() {
    let app = app().await;
    let alice = login(&app, "alice", "secret").await;
    login(&app, "bob", "hunter2").await;

    let cases = [
        (json!({"toUser": "", "amount": 10}), "empty toUser field"),
        (
            json!({"toUser": "bob", "amount": 0}),
            "amount to send should be positive",
        ),
        (
            json!({"toUser": "bob", "amount": -5}),
            "amount to send should be positive",
        ),
        (
            json!({"toUser": "alice", "amount": 10}),
            "can't send coins to yourself",
        ),
        (
            json!({"toUser": "carol", "amount": 10}),
            "receiver user: record not found",
        ),
        (json!({"toUser": "bob", "amount": 1001}), "not enough coins"),
    ];
    for (payload, message) in cases {
        let (status, body) = call(&app, post_json("/api/sendCoin", Some(&alice), payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"], message);
    }

    let request = Request::builder()
        .method("POST")
        .uri("/api/sendCoin")
        .header(header::AUTHORIZATION, format!("Basic {alice}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _) = call(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(info(&app, &alice).await["coins"], 1000);
}
