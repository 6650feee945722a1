//! PostgreSQL forum store.
//!
//! Thin adapter over the model queries: validates input against the content
//! policy, then maps sqlx failures into [`StoreError`].

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;

use super::{ForumStore, SettingsStore, StoreError, StoreResult, TopicStore, UserStore};
use crate::db;
use crate::models::{
    Category, ContentPolicy, ExternalAccountLink, Lookup, NewExternalAccount, NewPost, NewTopic,
    NewUser, Post, SiteSetting, Tag, Topic, User,
};

/// Forum store backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgForumStore {
    pool: PgPool,
    policy: ContentPolicy,
}

impl PgForumStore {
    pub fn new(pool: PgPool, policy: ContentPolicy) -> Self {
        Self { pool, policy }
    }
}

#[async_trait]
impl UserStore for PgForumStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        User::find_by_email(&self.pool, email)
            .await
            .map_err(StoreError::from_query)
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        User::find_by_username(&self.pool, username)
            .await
            .map_err(StoreError::from_query)
    }

    async fn username_exists(&self, username: &str) -> StoreResult<bool> {
        User::username_exists(&self.pool, username)
            .await
            .map_err(StoreError::from_query)
    }

    async fn create_user(&self, input: &NewUser) -> StoreResult<User> {
        User::create(&self.pool, input)
            .await
            .map_err(StoreError::from_query)
    }

    async fn find_external_account(
        &self,
        user_id: i64,
        provider_name: &str,
        provider_uid: &str,
    ) -> StoreResult<Option<ExternalAccountLink>> {
        ExternalAccountLink::find(&self.pool, user_id, provider_name, provider_uid)
            .await
            .map_err(StoreError::from_query)
    }

    async fn create_external_account(
        &self,
        input: &NewExternalAccount,
    ) -> StoreResult<ExternalAccountLink> {
        ExternalAccountLink::create(&self.pool, input)
            .await
            .map_err(StoreError::from_query)
    }
}

#[async_trait]
impl TopicStore for PgForumStore {
    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        Category::list(&self.pool)
            .await
            .map_err(StoreError::from_query)
    }

    async fn find_or_create_tag(&self, name: &str) -> StoreResult<Lookup<Tag>> {
        Tag::find_or_create(&self.pool, name)
            .await
            .map_err(StoreError::from_query)
    }

    async fn create_topic(&self, input: &NewTopic) -> StoreResult<Topic> {
        input.validate(&self.policy)?;
        Topic::create(&self.pool, input)
            .await
            .map_err(StoreError::from_query)
    }

    async fn find_topic(&self, id: i64) -> StoreResult<Option<Topic>> {
        Topic::find_by_id(&self.pool, id)
            .await
            .map_err(StoreError::from_query)
    }

    async fn list_latest_topics(&self, limit: i64) -> StoreResult<Vec<Topic>> {
        Topic::list_latest(&self.pool, limit)
            .await
            .map_err(StoreError::from_query)
    }

    async fn list_topics_by_user(&self, user_id: i64, limit: i64) -> StoreResult<Vec<Topic>> {
        Topic::list_by_user(&self.pool, user_id, limit)
            .await
            .map_err(StoreError::from_query)
    }

    async fn topic_tags(&self, topic_id: i64) -> StoreResult<Vec<Tag>> {
        Tag::for_topic(&self.pool, topic_id)
            .await
            .map_err(StoreError::from_query)
    }

    async fn create_post(&self, input: &NewPost) -> StoreResult<Post> {
        input.validate(&self.policy)?;
        Post::create(&self.pool, input)
            .await
            .map_err(StoreError::from_query)
    }

    async fn first_post(&self, topic_id: i64) -> StoreResult<Option<Post>> {
        Post::first_of(&self.pool, topic_id)
            .await
            .map_err(StoreError::from_query)
    }

    async fn first_posts(&self, topic_ids: &[i64]) -> StoreResult<HashMap<i64, Post>> {
        Post::first_of_many(&self.pool, topic_ids)
            .await
            .map_err(StoreError::from_query)
    }

    async fn set_topic_custom_field(
        &self,
        topic_id: i64,
        name: &str,
        value: &str,
    ) -> StoreResult<()> {
        Topic::set_custom_field(&self.pool, topic_id, name, value)
            .await
            .map_err(StoreError::from_query)
    }

    async fn topic_custom_field(&self, topic_id: i64, name: &str) -> StoreResult<Option<String>> {
        Topic::custom_field(&self.pool, topic_id, name)
            .await
            .map_err(StoreError::from_query)
    }

    async fn topic_custom_fields(
        &self,
        topic_ids: &[i64],
        name: &str,
    ) -> StoreResult<HashMap<i64, String>> {
        Topic::custom_fields_for(&self.pool, topic_ids, name)
            .await
            .map_err(StoreError::from_query)
    }

    async fn count_topic_likes(&self, topic_id: i64) -> StoreResult<i64> {
        Topic::count_likes(&self.pool, topic_id)
            .await
            .map_err(StoreError::from_query)
    }

    async fn count_topic_likes_bulk(&self, topic_ids: &[i64]) -> StoreResult<HashMap<i64, i64>> {
        Topic::count_likes_for(&self.pool, topic_ids)
            .await
            .map_err(StoreError::from_query)
    }
}

#[async_trait]
impl SettingsStore for PgForumStore {
    async fn site_setting(&self, name: &str) -> StoreResult<Option<serde_json::Value>> {
        SiteSetting::get(&self.pool, name)
            .await
            .map_err(StoreError::from_query)
    }

    async fn set_site_setting(&self, name: &str, value: &serde_json::Value) -> StoreResult<()> {
        SiteSetting::set(&self.pool, name, value)
            .await
            .map_err(StoreError::from_query)
    }
}

#[async_trait]
impl ForumStore for PgForumStore {
    async fn healthy(&self) -> bool {
        db::check_health(&self.pool).await
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
