use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use realworld_api::types::UserId;
use realworld_api::{AuthConfig, DatabaseConfig, TokenCodec};

#[derive(Parser)]
#[command(name = "realworld-api")]
#[command(about = "RealWorld blogging API backend")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        #[arg(long, default_value = "0.0.0.0:8080", env = "REALWORLD_BIND")]
        bind: String,
        #[arg(long, env = "REALWORLD_DB_URL", default_value = "memory")]
        db_url: String,
        /// HMAC secret for signing tokens
        #[arg(long, env = "REALWORLD_JWT_SECRET", hide_env_values = true)]
        jwt_secret: Option<String>,
        /// Token validity window in hours
        #[arg(long, env = "REALWORLD_TOKEN_TTL_HOURS")]
        token_ttl_hours: Option<i64>,
        /// Upper bound on a single identity lookup, in milliseconds
        #[arg(long, env = "REALWORLD_STORE_TIMEOUT_MS")]
        store_timeout_ms: Option<u64>,
    },
    /// Initialize the database schema
    Init {
        #[arg(long, env = "REALWORLD_DB_URL", default_value = "memory")]
        db_url: String,
    },
    /// Issue a token for an existing user id
    IssueToken {
        user_id: i64,
        #[arg(long, env = "REALWORLD_JWT_SECRET", hide_env_values = true)]
        jwt_secret: String,
        #[arg(long, env = "REALWORLD_TOKEN_TTL_HOURS")]
        token_ttl_hours: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            bind,
            db_url,
            jwt_secret,
            token_ttl_hours,
            store_timeout_ms,
        } => {
            let db_config = DatabaseConfig {
                url: db_url,
                ..Default::default()
            };
            let mut auth_config = build_auth_config(jwt_secret, token_ttl_hours)?;
            if let Some(ms) = store_timeout_ms {
                auth_config.store_timeout_ms = ms;
            }
            info!("Using database url: {}", db_config.url);
            info!(
                "Tokens valid for {} hours",
                auth_config.token_validity_hours
            );

            let app = realworld_api::create_app(db_config, &auth_config).await?;

            let listener = tokio::net::TcpListener::bind(&bind).await?;
            info!("Listening on http://{}", bind);
            axum::serve(listener, app).await?;
        }
        Commands::Init { db_url } => {
            let db_config = DatabaseConfig {
                url: db_url,
                ..Default::default()
            };
            info!("Initializing database at {}", db_config.url);
            let db = realworld_api::create_connection(db_config).await?;
            realworld_api::ensure_schema(&db).await?;
            info!("Database initialized successfully");
        }
        Commands::IssueToken {
            user_id,
            jwt_secret,
            token_ttl_hours,
        } => {
            let auth_config = build_auth_config(Some(jwt_secret), token_ttl_hours)?;
            let codec = TokenCodec::from_config(&auth_config);
            let token = codec.encode(UserId::new(user_id))?;
            println!("{}", token);
        }
    }

    Ok(())
}

const DEFAULT_LOG_FILTER: &str = "realworld_api=info,tower_http=info";

/// `RUST_LOG` wins when set and valid, e.g. `RUST_LOG=realworld_api=debug`.
fn log_filter(directives: Option<String>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Build auth configuration, letting CLI arguments override the environment.
fn build_auth_config(
    jwt_secret: Option<String>,
    token_ttl_hours: Option<i64>,
) -> Result<AuthConfig> {
    let mut config = match jwt_secret {
        Some(secret) => AuthConfig::with_secret(secret),
        None => AuthConfig::default(),
    };

    if let Some(hours) = token_ttl_hours {
        config.token_validity_hours = hours;
    }

    config.validate()?;
    Ok(config)
}
