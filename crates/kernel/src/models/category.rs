//! Category and tag models.
//!
//! Categories are managed by the forum host; this service only reads them to
//! place new topics. Tags are get-or-create by exact name.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// A forum category.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    /// Restricted categories are only readable by some groups.
    pub read_restricted: bool,
}

/// A named topic label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tag {
    pub id: i64,
    /// Unique, matched case-sensitively.
    pub name: String,
}

/// Outcome of a find-or-create lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    Created(T),
}

impl<T> Lookup<T> {
    pub fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Self::Found(v) | Self::Created(v) => v,
        }
    }
}

impl Category {
    /// List all categories in creation order.
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>> {
        let categories = sqlx::query_as::<_, Self>(
            "SELECT id, name, read_restricted FROM categories ORDER BY id",
        )
        .fetch_all(pool)
        .await
        .context("failed to list categories")?;

        Ok(categories)
    }
}

impl Tag {
    /// Find a tag by exact name, creating it when absent.
    ///
    /// The insert relies on the unique name constraint, so two concurrent
    /// callers settle on the same row.
    pub async fn find_or_create(pool: &PgPool, name: &str) -> Result<Lookup<Self>> {
        let inserted = sqlx::query_as::<_, Self>(
            "INSERT INTO tags (name) VALUES ($1) ON CONFLICT (name) DO NOTHING RETURNING id, name",
        )
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("failed to create tag")?;

        if let Some(tag) = inserted {
            return Ok(Lookup::Created(tag));
        }

        let tag = sqlx::query_as::<_, Self>("SELECT id, name FROM tags WHERE name = $1")
            .bind(name)
            .fetch_one(pool)
            .await
            .context("failed to fetch tag")?;

        Ok(Lookup::Found(tag))
    }

    /// Tags attached to a topic, in attachment order.
    pub async fn for_topic(pool: &PgPool, topic_id: i64) -> Result<Vec<Self>> {
        let tags = sqlx::query_as::<_, Self>(
            r#"
            SELECT t.id, t.name FROM tags t
            INNER JOIN topic_tags tt ON tt.tag_id = t.id
            WHERE tt.topic_id = $1
            ORDER BY tt.position
            "#,
        )
        .bind(topic_id)
        .fetch_all(pool)
        .await
        .context("failed to fetch topic tags")?;

        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_reports_creation() {
        let created = Lookup::Created(3);
        let found = Lookup::Found(4);
        assert!(created.was_created());
        assert!(!found.was_created());
        assert_eq!(found.into_inner(), 4);
    }
}
