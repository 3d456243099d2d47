//! Signed, time-bound bearer tokens.
//!
//! Tokens are HS256 JWTs carrying `{sub, iat, exp}`. The signature and
//! algorithm are checked by `jsonwebtoken`; expiry is checked here against an
//! injectable [`Clock`] so it can be exercised with simulated time.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::types::UserId;

/// Literal prefix of the `Authorization` header value.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Source of the current time for issuing and expiring tokens.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a given instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Why a presented token was not accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The header is absent, does not start with `Bearer `, or carries no token
    MissingOrMalformedHeader,
    /// Not a well-formed envelope signed with the server secret
    Malformed(String),
    /// The envelope is authentic but past its expiry
    Expired,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingOrMalformedHeader => {
                write!(f, "missing or malformed Authorization header")
            }
            Self::Malformed(reason) => write!(f, "malformed token: {}", reason),
            Self::Expired => write!(f, "token has expired"),
        }
    }
}

impl std::error::Error for TokenError {}

/// Claims embedded in every issued token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// User id, as a decimal string
    pub sub: String,
    /// Issued-at (Unix timestamp, seconds)
    pub iat: i64,
    /// Expiry (Unix timestamp, seconds)
    pub exp: i64,
}

/// Pull the raw token out of an `Authorization` header value.
///
/// The value must start with `Bearer ` and have a non-empty remainder.
pub fn extract_bearer(header: Option<&str>) -> Result<&str, TokenError> {
    let token = header
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .ok_or(TokenError::MissingOrMalformedHeader)?;

    if token.is_empty() {
        return Err(TokenError::MissingOrMalformedHeader);
    }
    Ok(token)
}

/// Encodes user ids into tokens and back.
///
/// Holds the process-wide signing secret; share it behind an `Arc`.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validity: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    /// Create a codec that reads the wall clock.
    pub fn new(secret: &[u8], validity: Duration) -> Self {
        Self::with_clock(secret, validity, Arc::new(SystemClock))
    }

    pub fn with_clock(secret: &[u8], validity: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validity,
            clock,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.jwt_secret.as_bytes(), config.token_validity())
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }

    /// Issue a token for `subject`, valid from now for the configured window.
    pub fn encode(&self, subject: UserId) -> Result<String> {
        let issued_at = self.clock.now();
        let claims = TokenClaims {
            sub: subject.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.validity).timestamp(),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Verify `raw` and return the user id it was issued for.
    ///
    /// The signature is verified before any claim is read.
    pub fn decode(&self, raw: &str) -> Result<UserId, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = jsonwebtoken::decode::<TokenClaims>(raw, &self.decoding_key, &validation)
            .map_err(|e| TokenError::Malformed(describe_error(e.kind())))?;

        if self.clock.now().timestamp() >= data.claims.exp {
            return Err(TokenError::Expired);
        }

        data.claims
            .sub
            .parse::<UserId>()
            .map_err(|_| TokenError::Malformed("subject is not a user id".to_string()))
    }
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("validity", &self.validity)
            .finish_non_exhaustive()
    }
}

/// Client-safe description of a decoding failure. Never includes key material.
fn describe_error(kind: &ErrorKind) -> String {
    match kind {
        ErrorKind::InvalidToken => "not a signed token".to_string(),
        ErrorKind::InvalidSignature => "signature mismatch".to_string(),
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
            "unexpected signing algorithm".to_string()
        }
        ErrorKind::MissingRequiredClaim(claim) => format!("missing claim `{}`", claim),
        ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
            "undecodable token segment".to_string()
        }
        _ => "invalid token".to_string(),
    }
}
