// Database query helpers for SurrealDB.

use crate::db::Db;
use crate::db::schema::*;
use crate::types::TagName;
use anyhow::{Result, anyhow};

/// Projection shared by every query that returns a `UserRecord`.
pub(crate) const USER_FIELDS: &str =
    "record::id(id) AS id, username, email, password_hash, bio, image, created_at";

pub struct QueryBuilder;

impl QueryBuilder {
    /// Allocate the next value of a named sequence, starting at 1.
    pub async fn next_sequence_value(db: &Db, name: &str) -> Result<i64> {
        let mut res = db
            .query("UPSERT type::thing('sequence', $name) SET value += 1 RETURN AFTER")
            .bind(("name", name.to_string()))
            .await?;

        let rows: Vec<SequenceRecord> = res.take(0)?;
        rows.into_iter()
            .next()
            .map(|row| row.value)
            .ok_or_else(|| anyhow!("sequence {} returned no value", name))
    }

    /// List all tag names in alphabetical order.
    pub async fn list_tags(db: &Db) -> Result<Vec<TagName>> {
        let mut res = db.query("SELECT name FROM tag ORDER BY name ASC").await?;
        let tags: Vec<TagRecord> = res.take(0)?;
        Ok(tags.into_iter().map(|t| TagName::new(t.name)).collect())
    }

    /// Insert a tag, doing nothing if it already exists.
    pub async fn upsert_tag(db: &Db, name: &TagName) -> Result<()> {
        db.query("UPSERT type::thing('tag', $name) SET name = $name")
            .bind(("name", name.as_str().to_string()))
            .await?
            .check()?;
        Ok(())
    }
}
