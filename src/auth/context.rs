//! Request-scoped identity.

use axum::extract::FromRequestParts;
use http::request::Parts;

use crate::api::ApiError;
use crate::db::schema::UserRecord;
use crate::types::{Email, UserId, Username};

/// The user an admitted request runs as.
///
/// Only the auth gate can build one, so its presence in a request's
/// extensions means the request was admitted. It lives as long as the
/// request and is never shared with another one.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    id: UserId,
    username: Username,
    email: Email,
    bio: Option<String>,
    image: Option<String>,
    /// Token the request was admitted with
    token: String,
}

impl AuthenticatedUser {
    pub(crate) fn new(record: UserRecord, token: String) -> Self {
        Self {
            id: UserId::new(record.id),
            username: Username::new(record.username),
            email: Email::new(record.email),
            bio: record.bio,
            image: record.image,
            token,
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn username(&self) -> &Username {
        &self.username
    }

    pub fn email(&self) -> &Email {
        &self.email
    }

    pub fn bio(&self) -> Option<&str> {
        self.bio.as_deref()
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

/// Extractor for handlers behind the auth middleware.
///
/// Rejects with 401 when the request was not admitted by the gate, which
/// only happens if a handler using it is mounted on an unprotected route.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| ApiError::Unauthorized {
                message: "authentication required".to_string(),
                detail: None,
            })
    }
}
