//! Router-level tests driving requests through the full middleware stack.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use chrono::{Duration, Utc};
use http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tokio::task::JoinSet;
use tower::ServiceExt;

use super::*;
use crate::auth::testing::MemoryIdentityStore;
use crate::auth::{FixedClock, IdentityStore, TokenCodec};
use crate::db::{DatabaseConfig, create_connection, ensure_schema};
use crate::types::{TagName, UserId};

const SECRET: &[u8] = b"integration-secret";
const TEST_HASH_COST: u32 = 4;

async fn setup_test_db() -> Db {
    let config = DatabaseConfig {
        url: "memory".to_string(),
        ..Default::default()
    };
    let db = create_connection(config).await.unwrap();
    ensure_schema(&db).await.unwrap();
    db
}

fn codec() -> Arc<TokenCodec> {
    Arc::new(TokenCodec::new(SECRET, Duration::hours(24)))
}

/// App whose gate resolves identities from the database.
async fn db_app() -> (Router, Db) {
    let db = setup_test_db().await;
    let users = Arc::new(UserStore::new(db.clone()).with_hash_cost(TEST_HASH_COST));
    let gate = AuthGate::new(codec(), users.clone());
    let app = create_router(AppState {
        db: db.clone(),
        users,
        gate,
    });
    (app, db)
}

/// App whose gate resolves identities from `store`.
async fn memory_app(store: Arc<MemoryIdentityStore>) -> Router {
    let db = setup_test_db().await;
    let identities: Arc<dyn IdentityStore> = store;
    create_router(AppState {
        db: db.clone(),
        users: Arc::new(UserStore::new(db)),
        gate: AuthGate::new(codec(), identities),
    })
}

fn get_request(uri: &str, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn bearer(id: i64) -> String {
    format!("Bearer {}", codec().encode(UserId::new(id)).unwrap())
}

#[tokio::test]
async fn test_create_app_rejects_empty_secret() {
    let db_config = DatabaseConfig {
        url: "memory".to_string(),
        ..Default::default()
    };
    let result = crate::create_app(db_config, &crate::AuthConfig::with_secret("")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_ping() {
    let (app, _) = db_app().await;
    let (status, body) = send(&app, get_request("/ping", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "pong" }));
}

#[tokio::test]
async fn test_list_tags() {
    let (app, db) = db_app().await;

    let (status, body) = send(&app, get_request("/api/tags", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    for name in ["rust", "axum"] {
        QueryBuilder::upsert_tag(&db, &TagName::new(name)).await.unwrap();
    }

    let (status, body) = send(&app, get_request("/api/tags", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(["axum", "rust"]));
}

#[tokio::test]
async fn test_register_then_fetch_current_user() {
    let (app, _) = db_app().await;

    let (status, body) = send(
        &app,
        post_json(
            "/api/users",
            json!({ "user": { "username": "jake", "email": "jake@jake.jake", "password": "jakejake" } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "jake");
    let token = body["user"]["token"].as_str().unwrap().to_string();

    let (status, body) = send(&app, get_request("/api/user", Some(&format!("Bearer {}", token)))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "jake@jake.jake");
    assert_eq!(body["user"]["token"], token);
}

#[tokio::test]
async fn test_login() {
    let (app, _) = db_app().await;
    send(
        &app,
        post_json(
            "/api/users",
            json!({ "user": { "username": "jake", "email": "jake@jake.jake", "password": "jakejake" } }),
        ),
    )
    .await;

    let (status, body) = send(
        &app,
        post_json(
            "/api/users/login",
            json!({ "user": { "email": "jake@jake.jake", "password": "jakejake" } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "jake");
    assert!(body["user"]["token"].as_str().is_some());

    let (status, body) = send(
        &app,
        post_json(
            "/api/users/login",
            json!({ "user": { "email": "jake@jake.jake", "password": "nope" } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "invalid email or password");
}

#[tokio::test]
async fn test_register_validation() {
    let (app, _) = db_app().await;
    let jake = json!({ "user": { "username": "jake", "email": "jake@jake.jake", "password": "pw" } });

    let (status, _) = send(&app, post_json("/api/users", jake.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, post_json("/api/users", jake)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "email has already been taken");

    let (status, body) = send(
        &app,
        post_json(
            "/api/users",
            json!({ "user": { "username": " ", "email": "x@y.z", "password": "pw" } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "username can't be blank");

    let (status, body) = send(&app, post_json("/api/users", json!({ "user": {} }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["message"].as_str().is_some());
}

#[tokio::test]
async fn test_missing_header_rejected_without_lookup() {
    let store = Arc::new(MemoryIdentityStore::new().with_user(42));
    let app = memory_app(store.clone()).await;

    for header in [None, Some(""), Some("Bearer"), Some("Basic abc")] {
        let (status, body) = send(&app, get_request("/api/user", header)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "jwt auth fail");
        assert_eq!(body["detail"], "missing or malformed Authorization header");
    }
    assert_eq!(store.reads(), 0);
}

#[tokio::test]
async fn test_valid_token_admitted() {
    let store = Arc::new(MemoryIdentityStore::new().with_user(42));
    let app = memory_app(store.clone()).await;

    let (status, body) = send(&app, get_request("/api/user", Some(&bearer(42)))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "user-42");
    assert_eq!(store.reads(), 1);
}

#[tokio::test]
async fn test_expired_token_rejected_without_lookup() {
    let store = Arc::new(MemoryIdentityStore::new().with_user(42));
    let app = memory_app(store.clone()).await;

    let issued = Utc::now() - Duration::hours(48);
    let past = TokenCodec::with_clock(SECRET, Duration::hours(24), Arc::new(FixedClock(issued)));
    let header = format!("Bearer {}", past.encode(UserId::new(42)).unwrap());

    let (status, body) = send(&app, get_request("/api/user", Some(&header))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "token has expired");
    assert_eq!(store.reads(), 0);
}

#[tokio::test]
async fn test_malformed_token_rejected() {
    let store = Arc::new(MemoryIdentityStore::new().with_user(42));
    let app = memory_app(store.clone()).await;

    let (status, body) = send(&app, get_request("/api/user", Some("Bearer abc.def.ghi"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "jwt auth fail");
    assert!(body["detail"].as_str().unwrap().starts_with("malformed token"));
    assert!(!body.to_string().contains("integration-secret"));
    assert_eq!(store.reads(), 0);
}

#[tokio::test]
async fn test_unknown_subject_rejected() {
    let store = Arc::new(MemoryIdentityStore::new().with_user(42));
    let app = memory_app(store.clone()).await;

    let (status, body) = send(&app, get_request("/api/user", Some(&bearer(9)))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "invalid token!");
    assert_eq!(store.reads(), 1);
}

#[tokio::test]
async fn test_store_outage_is_500() {
    let store = Arc::new(MemoryIdentityStore::new().with_user(42));
    store.set_unavailable(true);
    let app = memory_app(store.clone()).await;

    let (status, body) = send(&app, get_request("/api/user", Some(&bearer(42)))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "internal server error");
}

#[tokio::test]
async fn test_failed_database_lookup_is_500() {
    let (app, db) = db_app().await;
    db.query("REMOVE TABLE user; DEFINE TABLE user SCHEMALESS; CREATE user:42 SET username = 42;")
        .await
        .unwrap()
        .check()
        .unwrap();

    let (status, body) = send(&app, get_request("/api/user", Some(&bearer(42)))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "internal server error");
    assert!(body.get("detail").is_none());
}

#[tokio::test]
async fn test_unreachable_database_is_500() {
    // Never selecting a namespace makes every lookup fail
    let db = surrealdb::engine::any::connect("memory").await.unwrap();
    let users = Arc::new(
        UserStore::new(db.clone()).with_timeout(std::time::Duration::from_millis(50)),
    );
    let app = create_router(AppState {
        db,
        users: users.clone(),
        gate: AuthGate::new(codec(), users),
    });

    let (status, body) = send(&app, get_request("/api/user", Some(&bearer(42)))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "internal server error");
}

#[tokio::test]
async fn test_public_routes_ignore_bad_tokens() {
    let store = Arc::new(MemoryIdentityStore::new());
    let app = memory_app(store.clone()).await;

    let (status, _) = send(&app, get_request("/api/tags", Some("Bearer junk"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(store.reads(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_keep_their_own_identity() {
    const REQUESTS: i64 = 1000;
    let store = Arc::new(MemoryIdentityStore::new().with_users(1..=REQUESTS));
    let app = memory_app(store.clone()).await;

    let mut tasks = JoinSet::new();
    for id in 1..=REQUESTS {
        let app = app.clone();
        let header = bearer(id);
        tasks.spawn(async move {
            let (status, body) = send(&app, get_request("/api/user", Some(&header))).await;
            (id, status, body)
        });
    }

    let mut seen = 0;
    while let Some(result) = tasks.join_next().await {
        let (id, status, body) = result.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["username"], format!("user-{}", id));
        assert_eq!(body["user"]["email"], format!("user-{}@example.com", id));
        seen += 1;
    }

    assert_eq!(seen, REQUESTS);
    assert_eq!(store.reads(), REQUESTS as usize);
}
