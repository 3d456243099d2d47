use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::{env, fmt, time::Duration};
use tracing::warn;

pub const DEFAULT_TOKEN_VALIDITY_HOURS: i64 = 24;
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;

/// Token signing and identity lookup settings.
///
/// Values come from the environment (`REALWORLD_JWT_SECRET`,
/// `REALWORLD_TOKEN_TTL_HOURS`, `REALWORLD_STORE_TIMEOUT_MS`) and can be
/// overridden from the command line.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to sign and verify tokens
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    /// How long an issued token stays valid
    #[serde(default = "default_token_validity_hours")]
    pub token_validity_hours: i64,
    /// Upper bound on a single identity lookup
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
}

fn default_token_validity_hours() -> i64 {
    DEFAULT_TOKEN_VALIDITY_HOURS
}

fn default_store_timeout_ms() -> u64 {
    DEFAULT_STORE_TIMEOUT_MS
}

impl Default for AuthConfig {
    fn default() -> Self {
        let jwt_secret = env::var("REALWORLD_JWT_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| {
                warn!("REALWORLD_JWT_SECRET is not set; tokens will not survive a restart");
                generate_secret()
            });

        Self {
            jwt_secret,
            token_validity_hours: env::var("REALWORLD_TOKEN_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_TOKEN_VALIDITY_HOURS),
            store_timeout_ms: env::var("REALWORLD_STORE_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_STORE_TIMEOUT_MS),
        }
    }
}

impl AuthConfig {
    /// Create a config with an explicit secret and default timings.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: secret.into(),
            token_validity_hours: DEFAULT_TOKEN_VALIDITY_HOURS,
            store_timeout_ms: DEFAULT_STORE_TIMEOUT_MS,
        }
    }

    /// Reject settings that cannot be used to run the server.
    ///
    /// An empty secret would let anyone sign tokens the codec accepts.
    pub fn validate(&self) -> Result<()> {
        if self.jwt_secret.trim().is_empty() {
            bail!("jwt secret must not be empty");
        }
        if self.token_validity_hours <= 0 {
            bail!(
                "token validity must be positive, got {} hours",
                self.token_validity_hours
            );
        }
        Ok(())
    }

    pub fn token_validity(&self) -> chrono::Duration {
        chrono::Duration::hours(self.token_validity_hours)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

// The secret never shows up in logs.
impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("token_validity_hours", &self.token_validity_hours)
            .field("store_timeout_ms", &self.store_timeout_ms)
            .finish()
    }
}

fn generate_secret() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}
