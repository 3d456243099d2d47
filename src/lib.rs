mod config;
pub mod api;
pub mod auth;
pub mod db;
pub mod types;

pub use api::{AppState, create_router};
pub use auth::{AuthGate, TokenCodec, UserStore};
pub use config::AuthConfig;
pub use db::{DatabaseConfig, create_connection, ensure_schema};

use anyhow::Result;
use axum::Router;
use std::sync::Arc;

/// Check the auth settings, connect to the database, make sure the schema exists, and build the router.
pub async fn create_app(db_config: DatabaseConfig, auth_config: &AuthConfig) -> Result<Router> {
    auth_config.validate()?;
    let db = create_connection(db_config).await?;
    ensure_schema(&db).await?;

    let users = Arc::new(UserStore::new(db.clone()).with_timeout(auth_config.store_timeout()));
    let codec = Arc::new(TokenCodec::from_config(auth_config));
    let gate = AuthGate::new(codec, users.clone());

    Ok(create_router(AppState { db, users, gate }))
}
