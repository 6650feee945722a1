//! Topic model: discussion threads, their tags and custom fields.

use std::collections::HashMap;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::validation::{ContentPolicy, ValidationErrors};

/// Post action type id used by the reaction subsystem for likes.
pub const LIKE_ACTION_TYPE: i16 = 2;

/// Runs of characters that cannot appear in a slug.
///
/// # Panics
///
/// Panics if the hard-coded regex literal is invalid (impossible in practice).
#[allow(clippy::expect_used)]
static NON_SLUG_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex literal"));

/// Topic record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Topic {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub user_id: i64,
    pub category_id: i64,
    pub last_post_user_id: i64,
    pub posts_count: i32,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a topic.
#[derive(Debug, Clone)]
pub struct NewTopic {
    pub title: String,
    pub user_id: i64,
    pub category_id: i64,
    /// Tag ids in attachment order.
    pub tag_ids: Vec<i64>,
}

impl NewTopic {
    pub fn validate(&self, policy: &ContentPolicy) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        policy.check_title(&self.title, &mut errors);
        errors.into_result()
    }
}

impl Topic {
    /// Host-relative canonical URL, `/t/<slug>/<id>`.
    pub fn url(&self) -> String {
        format!("/t/{}/{}", self.slug, self.id)
    }

    /// Create a topic and attach its tags.
    pub async fn create(pool: &PgPool, input: &NewTopic) -> Result<Self> {
        let mut tx = pool.begin().await.context("failed to begin transaction")?;

        let topic = sqlx::query_as::<_, Topic>(
            r#"
            INSERT INTO topics (title, slug, user_id, category_id, last_post_user_id)
            VALUES ($1, $2, $3, $4, $3)
            RETURNING *
            "#,
        )
        .bind(input.title.trim())
        .bind(slug_for(&input.title))
        .bind(input.user_id)
        .bind(input.category_id)
        .fetch_one(&mut *tx)
        .await
        .context("failed to create topic")?;

        for (position, tag_id) in input.tag_ids.iter().enumerate() {
            sqlx::query(
                "INSERT INTO topic_tags (topic_id, tag_id, position) VALUES ($1, $2, $3) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(topic.id)
            .bind(tag_id)
            .bind(i32::try_from(position).context("too many tags")?)
            .execute(&mut *tx)
            .await
            .context("failed to attach tag")?;
        }

        tx.commit().await.context("failed to commit topic")?;

        Ok(topic)
    }

    /// Find a topic by ID.
    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>> {
        let topic = sqlx::query_as::<_, Topic>("SELECT * FROM topics WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch topic")?;

        Ok(topic)
    }

    /// Most recent topics first.
    pub async fn list_latest(pool: &PgPool, limit: i64) -> Result<Vec<Self>> {
        let topics = sqlx::query_as::<_, Topic>(
            "SELECT * FROM topics ORDER BY created_at DESC, id DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("failed to list topics")?;

        Ok(topics)
    }

    /// Topics started by a user, most recent first.
    pub async fn list_by_user(pool: &PgPool, user_id: i64, limit: i64) -> Result<Vec<Self>> {
        let topics = sqlx::query_as::<_, Topic>(
            "SELECT * FROM topics WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("failed to list user topics")?;

        Ok(topics)
    }

    /// Set a custom field, replacing any previous value.
    pub async fn set_custom_field(pool: &PgPool, topic_id: i64, name: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO topic_custom_fields (topic_id, name, value)
            VALUES ($1, $2, $3)
            ON CONFLICT (topic_id, name) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(topic_id)
        .bind(name)
        .bind(value)
        .execute(pool)
        .await
        .context("failed to save topic custom field")?;

        Ok(())
    }

    /// Read one custom field.
    pub async fn custom_field(pool: &PgPool, topic_id: i64, name: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar::<_, String>(
            "SELECT value FROM topic_custom_fields WHERE topic_id = $1 AND name = $2",
        )
        .bind(topic_id)
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("failed to fetch topic custom field")?;

        Ok(value)
    }

    /// Read one custom field for many topics at once.
    pub async fn custom_fields_for(
        pool: &PgPool,
        topic_ids: &[i64],
        name: &str,
    ) -> Result<HashMap<i64, String>> {
        let rows = sqlx::query_as::<_, (i64, String)>(
            "SELECT topic_id, value FROM topic_custom_fields WHERE topic_id = ANY($1) AND name = $2",
        )
        .bind(topic_ids)
        .bind(name)
        .fetch_all(pool)
        .await
        .context("failed to preload topic custom fields")?;

        Ok(rows.into_iter().collect())
    }

    /// Count live likes on live posts of a topic.
    pub async fn count_likes(pool: &PgPool, topic_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM post_actions pa
            INNER JOIN posts p ON p.id = pa.post_id
            WHERE p.topic_id = $1
              AND p.deleted_at IS NULL
              AND pa.post_action_type_id = $2
              AND pa.deleted_at IS NULL
            "#,
        )
        .bind(topic_id)
        .bind(LIKE_ACTION_TYPE)
        .fetch_one(pool)
        .await
        .context("failed to count topic likes")?;

        Ok(count)
    }

    /// Like counts for many topics; topics without likes are absent.
    pub async fn count_likes_for(pool: &PgPool, topic_ids: &[i64]) -> Result<HashMap<i64, i64>> {
        let rows = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT p.topic_id, COUNT(*) FROM post_actions pa
            INNER JOIN posts p ON p.id = pa.post_id
            WHERE p.topic_id = ANY($1)
              AND p.deleted_at IS NULL
              AND pa.post_action_type_id = $2
              AND pa.deleted_at IS NULL
            GROUP BY p.topic_id
            "#,
        )
        .bind(topic_ids)
        .bind(LIKE_ACTION_TYPE)
        .fetch_all(pool)
        .await
        .context("failed to preload topic likes")?;

        Ok(rows.into_iter().collect())
    }
}

/// ASCII slug for a title, falling back to `topic` when nothing survives.
pub fn slug_for(title: &str) -> String {
    let lowered = title.to_lowercase();
    let slug = NON_SLUG_CHARS.replace_all(&lowered, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "topic".to_string()
    } else {
        slug.to_string()
    }
}
