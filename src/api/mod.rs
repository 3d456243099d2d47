// HTTP API: router, shared state and the small read-only handlers.

use axum::{
    Router,
    extract::State,
    middleware,
    response::Json,
    routing::{get, post},
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthGate, UserStore};
use crate::db::{Db, QueryBuilder};

mod auth_layer;
mod error;
pub mod users;

#[cfg(test)]
mod integration_tests;

pub use error::ApiError;
pub use auth_layer::require_auth;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub users: Arc<UserStore>,
    pub gate: AuthGate,
}

pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/user", get(users::current_user))
        .route_layer(middleware::from_fn_with_state(
            state.gate.clone(),
            require_auth,
        ));

    Router::new()
        .route("/ping", get(ping))
        .route("/api/tags", get(list_tags))
        .route("/api/users", post(users::register))
        .route("/api/users/login", post(users::login))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn ping() -> Json<Value> {
    Json(serde_json::json!({ "message": "pong" }))
}

/// List every tag name.
///
/// A failed query is a 500, never an empty list.
async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    let tags = QueryBuilder::list_tags(&state.db).await?;
    Ok(Json(tags.into_iter().map(|t| t.into_inner()).collect()))
}
