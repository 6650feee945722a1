//! Post model: messages within a topic.

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::validation::{ContentPolicy, ValidationErrors};

/// Post type for ordinary user messages.
pub const POST_TYPE_REGULAR: i16 = 1;

/// Post record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub topic_id: i64,
    pub user_id: i64,
    /// Position within the topic; the opening post is 1.
    pub post_number: i32,
    pub raw: String,
    pub post_type: i16,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Input for creating a post.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub topic_id: i64,
    pub user_id: i64,
    pub raw: String,
}

impl NewPost {
    pub fn validate(&self, policy: &ContentPolicy) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        policy.check_raw(&self.raw, &mut errors);
        errors.into_result()
    }
}

impl Post {
    /// Append a post to a topic, bumping the topic's counters.
    pub async fn create(pool: &PgPool, input: &NewPost) -> Result<Self> {
        let mut tx = pool.begin().await.context("failed to begin transaction")?;

        // Lock the topic row so post numbers stay dense.
        let posts_count: i32 =
            sqlx::query_scalar("SELECT posts_count FROM topics WHERE id = $1 FOR UPDATE")
                .bind(input.topic_id)
                .fetch_one(&mut *tx)
                .await
                .context("failed to lock topic")?;

        let post = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (topic_id, user_id, post_number, raw, post_type)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(input.topic_id)
        .bind(input.user_id)
        .bind(posts_count + 1)
        .bind(&input.raw)
        .bind(POST_TYPE_REGULAR)
        .fetch_one(&mut *tx)
        .await
        .context("failed to create post")?;

        sqlx::query(
            "UPDATE topics SET posts_count = posts_count + 1, last_post_user_id = $2 WHERE id = $1",
        )
        .bind(input.topic_id)
        .bind(input.user_id)
        .execute(&mut *tx)
        .await
        .context("failed to update topic counters")?;

        tx.commit().await.context("failed to commit post")?;

        Ok(post)
    }

    /// The live opening post of a topic.
    pub async fn first_of(pool: &PgPool, topic_id: i64) -> Result<Option<Self>> {
        let post = sqlx::query_as::<_, Post>(
            "SELECT * FROM posts WHERE topic_id = $1 AND post_number = 1 AND deleted_at IS NULL",
        )
        .bind(topic_id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch first post")?;

        Ok(post)
    }

    /// Opening posts for many topics, keyed by topic id.
    pub async fn first_of_many(pool: &PgPool, topic_ids: &[i64]) -> Result<HashMap<i64, Self>> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT * FROM posts
            WHERE topic_id = ANY($1) AND post_number = 1 AND deleted_at IS NULL
            "#,
        )
        .bind(topic_ids)
        .fetch_all(pool)
        .await
        .context("failed to preload first posts")?;

        Ok(posts.into_iter().map(|p| (p.topic_id, p)).collect())
    }
}
