use serde::{Deserialize, Serialize};
use surrealdb::sql::Datetime;

/// Persisted user record.
///
/// `id` is the integer key of the `user:<id>` record, projected out with
/// `record::id(id)` in every query that reads users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// bcrypt password hash
    pub password_hash: String,
    pub bio: Option<String>,
    pub image: Option<String>,
    pub created_at: Option<Datetime>,
}

/// Payload for creating a new user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCreate {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Persisted tag record (table: `tag`, keyed by name).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagRecord {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SequenceRecord {
    pub value: i64,
}
