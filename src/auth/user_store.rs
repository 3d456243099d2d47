//! User storage and credential checks.

use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::time::Duration;

use tracing::warn;

use crate::config::DEFAULT_STORE_TIMEOUT_MS;
use crate::db::schema::{UserCreate, UserRecord};
use crate::db::queries::USER_FIELDS;
use crate::db::{Db, QueryBuilder};
use crate::types::{Email, UserId, Username};

/// Errors surfaced by identity storage.
///
/// "No such user" is not an error; lookups return `Ok(None)` for that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The database could not be reached, the query failed, or it timed out
    Unavailable(String),
    /// A unique field (email or username) is already taken
    Conflict(String),
    /// Hashing or checking a password failed
    Credentials(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "identity store unavailable: {}", msg),
            Self::Conflict(field) => write!(f, "{} has already been taken", field),
            Self::Credentials(msg) => write!(f, "password hashing failed: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Read-only keyed lookup of users, as seen by the auth gate.
pub trait IdentityStore: Send + Sync {
    /// Fetch the user with the given id, or `None` if there is no such user.
    fn find_user(&self, id: UserId) -> StoreFuture<'_, Option<UserRecord>>;
}

/// Bcrypt cost used for new password hashes.
pub const DEFAULT_BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;

/// SurrealDB-backed user store.
///
/// Every query is bounded by `query_timeout`; an elapsed timeout is reported
/// as [`StoreError::Unavailable`].
pub struct UserStore {
    db: Db,
    query_timeout: Duration,
    hash_cost: u32,
}

impl UserStore {
    /// Create a new user store.
    pub fn new(db: Db) -> Self {
        Self {
            db,
            query_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
            hash_cost: DEFAULT_BCRYPT_COST,
        }
    }

    pub fn with_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    /// Override the bcrypt cost for passwords hashed by this store.
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    /// Get a user by id.
    pub async fn get_user_by_id(&self, id: UserId) -> Result<Option<UserRecord>, StoreError> {
        let query = format!("SELECT {USER_FIELDS} FROM type::thing('user', $id)");
        let query = self.db.query(query).bind(("id", id.get()));
        self.first_user(query).await
    }

    /// Get a user by login email.
    pub async fn get_user_by_email(&self, email: &Email) -> Result<Option<UserRecord>, StoreError> {
        let query = format!("SELECT {USER_FIELDS} FROM user WHERE email = $email LIMIT 1");
        let query = self
            .db
            .query(query)
            .bind(("email", email.as_str().to_string()));
        self.first_user(query).await
    }

    /// Get a user by username.
    pub async fn get_user_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<UserRecord>, StoreError> {
        let query = format!("SELECT {USER_FIELDS} FROM user WHERE username = $username LIMIT 1");
        let query = self
            .db
            .query(query)
            .bind(("username", username.as_str().to_string()));
        self.first_user(query).await
    }

    /// Register a new user with a freshly allocated id.
    pub async fn create_user(
        &self,
        username: &Username,
        email: &Email,
        password: &str,
    ) -> Result<UserRecord, StoreError> {
        if self.get_user_by_email(email).await?.is_some() {
            return Err(StoreError::Conflict("email".to_string()));
        }
        if self.get_user_by_username(username).await?.is_some() {
            return Err(StoreError::Conflict("username".to_string()));
        }

        let id = self
            .bounded(QueryBuilder::next_sequence_value(&self.db, "user"))
            .await?
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let create = UserCreate {
            username: username.as_str().to_string(),
            email: email.as_str().to_string(),
            password_hash: hash_password(password, self.hash_cost)?,
        };

        let query = self
            .db
            .query("CREATE type::thing('user', $id) CONTENT $content RETURN NONE")
            .bind(("id", id))
            .bind(("content", create));
        let res = self.bounded(query).await?.map_err(unavailable)?;

        // The unique indexes still catch a concurrent registration that
        // slipped past the checks above.
        if let Err(e) = res.check() {
            let msg = e.to_string();
            if msg.contains("already contains") {
                return Err(StoreError::Conflict(
                    if msg.contains("user_username") { "username" } else { "email" }.to_string(),
                ));
            }
            return Err(StoreError::Unavailable(msg));
        }

        self.get_user_by_id(UserId::new(id))
            .await?
            .ok_or_else(|| StoreError::Unavailable(format!("user {} vanished after create", id)))
    }

    /// Look up a user by email and check the password.
    ///
    /// Returns `None` both for an unknown email and for a wrong password.
    pub async fn verify_credentials(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        let Some(user) = self.get_user_by_email(email).await? else {
            return Ok(None);
        };
        if verify_password(password, &user.password_hash)? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    async fn first_user<Q>(&self, query: Q) -> Result<Option<UserRecord>, StoreError>
    where
        Q: IntoFuture<Output = surrealdb::Result<surrealdb::Response>>,
    {
        let mut res = self.bounded(query).await?.map_err(unavailable)?;
        let users: Vec<UserRecord> = res.take(0).map_err(unavailable)?;
        Ok(users.into_iter().next())
    }

    /// Run `fut` under the store's timeout.
    async fn bounded<F: IntoFuture>(&self, fut: F) -> Result<F::Output, StoreError> {
        tokio::time::timeout(self.query_timeout, fut)
            .await
            .map_err(|_| {
                warn!(timeout = ?self.query_timeout, "identity store query timed out");
                StoreError::Unavailable(format!("query timed out after {:?}", self.query_timeout))
            })
    }
}

impl IdentityStore for UserStore {
    fn find_user(&self, id: UserId) -> StoreFuture<'_, Option<UserRecord>> {
        Box::pin(self.get_user_by_id(id))
    }
}

fn unavailable(e: surrealdb::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

/// Hash a password with bcrypt at the given cost.
pub fn hash_password(password: &str, cost: u32) -> Result<String, StoreError> {
    bcrypt::hash(password, cost).map_err(|e| StoreError::Credentials(e.to_string()))
}

/// Check `password` against a hash produced by [`hash_password`].
///
/// A stored value that is not a bcrypt hash is an error, not a mismatch.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, StoreError> {
    bcrypt::verify(password, stored).map_err(|e| StoreError::Credentials(e.to_string()))
}
