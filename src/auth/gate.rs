//! Per-request admission decisions.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::auth::context::AuthenticatedUser;
use crate::auth::token::{TokenCodec, TokenError, extract_bearer};
use crate::auth::user_store::IdentityStore;
use crate::types::UserId;

/// Why the gate refused a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Header missing or token invalid; see [`TokenError`]
    Token(TokenError),
    /// The token is valid but its subject no longer exists
    UnknownSubject(UserId),
    /// The identity lookup itself failed
    StoreUnavailable(String),
}

impl AuthError {
    /// Whether the request itself is at fault (401) rather than the server.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::StoreUnavailable(_))
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(e) => write!(f, "{}", e),
            Self::UnknownSubject(_) => write!(f, "token subject does not exist"),
            Self::StoreUnavailable(msg) => write!(f, "identity store unavailable: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        Self::Token(e)
    }
}

/// Decides, per request, whether it may proceed and as whom.
///
/// A request moves through header extraction, token validation and identity
/// resolution; failing any step rejects it. The identity store is consulted
/// only once a token has been validated, and at most once per request.
#[derive(Clone)]
pub struct AuthGate {
    codec: Arc<TokenCodec>,
    store: Arc<dyn IdentityStore>,
}

impl AuthGate {
    pub fn new(codec: Arc<TokenCodec>, store: Arc<dyn IdentityStore>) -> Self {
        Self { codec, store }
    }

    pub fn codec(&self) -> &Arc<TokenCodec> {
        &self.codec
    }

    /// Admit or reject a request given its `Authorization` header value.
    pub async fn authenticate(
        &self,
        authorization: Option<&str>,
    ) -> Result<AuthenticatedUser, AuthError> {
        let raw = extract_bearer(authorization)?;
        let subject = self.codec.decode(raw)?;

        let user = self
            .store
            .find_user(subject)
            .await
            .map_err(|e| AuthError::StoreUnavailable(e.to_string()))?
            .ok_or(AuthError::UnknownSubject(subject))?;

        debug!(user_id = %subject, "request admitted");
        Ok(AuthenticatedUser::new(user, raw.to_string()))
    }
}

impl fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthGate")
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}
