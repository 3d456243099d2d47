use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use surrealdb::Surreal;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Root;
use tracing::info;

pub type Db = Surreal<Any>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: env::var("REALWORLD_DB_URL").unwrap_or_else(|_| "memory".to_string()),
            namespace: env::var("REALWORLD_DB_NAMESPACE")
                .unwrap_or_else(|_| "realworld".to_string()),
            database: env::var("REALWORLD_DB_DATABASE").unwrap_or_else(|_| "blog".to_string()),
            username: env::var("REALWORLD_DB_USERNAME").ok(),
            password: env::var("REALWORLD_DB_PASSWORD").ok(),
        }
    }
}

pub async fn create_connection(config: DatabaseConfig) -> Result<Db> {
    let db = surrealdb::engine::any::connect(config.url.as_str()).await?;

    // Sign in if credentials are provided
    if let (Some(username), Some(password)) = (config.username, config.password) {
        db.signin(Root {
            username: &username,
            password: &password,
        })
        .await?;
    }

    db.use_ns(config.namespace).use_db(config.database).await?;

    info!("connected to database {}", config.url);
    Ok(db)
}

/// Define the tables the API works with.
///
/// Every statement is idempotent (`IF NOT EXISTS`), so this runs on each
/// startup as well as from the `init` subcommand.
pub async fn ensure_schema(db: &Db) -> Result<()> {
    let schema_queries = [
        // Users; ids are integer keys drawn from sequence:user
        "DEFINE TABLE IF NOT EXISTS user SCHEMAFULL;
         DEFINE FIELD IF NOT EXISTS username ON TABLE user TYPE string;
         DEFINE FIELD IF NOT EXISTS email ON TABLE user TYPE string;
         DEFINE FIELD IF NOT EXISTS password_hash ON TABLE user TYPE string;
         DEFINE FIELD IF NOT EXISTS bio ON TABLE user TYPE option<string>;
         DEFINE FIELD IF NOT EXISTS image ON TABLE user TYPE option<string>;
         DEFINE FIELD IF NOT EXISTS created_at ON TABLE user TYPE datetime DEFAULT time::now();
         DEFINE INDEX IF NOT EXISTS user_email ON TABLE user COLUMNS email UNIQUE;
         DEFINE INDEX IF NOT EXISTS user_username ON TABLE user COLUMNS username UNIQUE;",

        "DEFINE TABLE IF NOT EXISTS article SCHEMALESS;
         DEFINE FIELD IF NOT EXISTS slug ON TABLE article TYPE string;
         DEFINE FIELD IF NOT EXISTS title ON TABLE article TYPE string;
         DEFINE FIELD IF NOT EXISTS author ON TABLE article TYPE record<user>;
         DEFINE FIELD IF NOT EXISTS tag_list ON TABLE article TYPE array<string> DEFAULT [];
         DEFINE FIELD IF NOT EXISTS created_at ON TABLE article TYPE datetime DEFAULT time::now();
         DEFINE INDEX IF NOT EXISTS article_slug ON TABLE article COLUMNS slug UNIQUE;",

        "DEFINE TABLE IF NOT EXISTS comment SCHEMALESS;
         DEFINE FIELD IF NOT EXISTS article ON TABLE comment TYPE record<article>;
         DEFINE FIELD IF NOT EXISTS author ON TABLE comment TYPE record<user>;
         DEFINE FIELD IF NOT EXISTS body ON TABLE comment TYPE string;
         DEFINE FIELD IF NOT EXISTS created_at ON TABLE comment TYPE datetime DEFAULT time::now();",

        // Tags are keyed by their name
        "DEFINE TABLE IF NOT EXISTS tag SCHEMAFULL;
         DEFINE FIELD IF NOT EXISTS name ON TABLE tag TYPE string;",

        "DEFINE TABLE IF NOT EXISTS sequence SCHEMAFULL;
         DEFINE FIELD IF NOT EXISTS value ON TABLE sequence TYPE int DEFAULT 0;",
    ];

    for query in schema_queries {
        db.query(query).await?.check()?;
    }

    Ok(())
}
