//! Forum storage abstraction layer.
//!
//! Every read and write the kernel makes against users, topics, and settings
//! goes through the traits in this module. Find-or-build operations return
//! their existence outcome explicitly instead of relying on ORM callbacks.
//!
//! Two implementations exist:
//!
//! - [`PgForumStore`]: PostgreSQL via sqlx, used in production
//! - [`MemoryForumStore`]: in-process tables, used by tests and local runs
//!
//! Uniqueness of usernames, emails, and external accounts is enforced by the
//! store itself and reported as [`StoreError::Conflict`] so callers can
//! retry with a different candidate.

mod memory;
mod postgres;

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryForumStore;
pub use postgres::PgForumStore;

use crate::models::{
    Category, ExternalAccountLink, Lookup, NewExternalAccount, NewPost, NewTopic, NewUser, Post,
    Tag, Topic, User, ValidationErrors,
};

/// The uniqueness constraint a write collided with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UniqueField {
    Username,
    Email,
    ExternalAccount,
    Other(String),
}

impl UniqueField {
    /// Map a PostgreSQL constraint name to the field it protects.
    pub fn from_constraint(name: Option<&str>) -> Self {
        match name {
            Some("users_username_lower_key") => Self::Username,
            Some("users_email_key") => Self::Email,
            Some("user_associated_accounts_provider_key") => Self::ExternalAccount,
            Some(other) => Self::Other(other.to_string()),
            None => Self::Other("record".to_string()),
        }
    }
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Username => f.write_str("Username"),
            Self::Email => f.write_str("Primary email"),
            Self::ExternalAccount => f.write_str("External account"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// Errors surfaced by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The record failed content validation.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// A uniqueness constraint rejected the write.
    #[error("{0} has already been taken")]
    Conflict(UniqueField),

    /// A referenced record does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Any other storage failure.
    #[error("{0:#}")]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    /// Classify an error raised by a sqlx-backed model query.
    ///
    /// Unique violations become [`StoreError::Conflict`]; everything else is
    /// kept whole so its context chain reaches the logs.
    pub fn from_query(err: anyhow::Error) -> Self {
        if let Some(sqlx::Error::Database(db_err)) = err.downcast_ref::<sqlx::Error>() {
            if db_err.is_unique_violation() {
                return Self::Conflict(UniqueField::from_constraint(db_err.constraint()));
            }
        }
        Self::Other(err)
    }
}

/// Result type alias using StoreError.
pub type StoreResult<T> = Result<T, StoreError>;

/// Users and their external identity links.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find the user owning a normalized primary email.
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Case-insensitive username lookup.
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    /// Case-insensitive username existence check.
    async fn username_exists(&self, username: &str) -> StoreResult<bool>;

    /// Insert a user. Fails with `Conflict(Username)` or `Conflict(Email)`
    /// when either is already taken.
    async fn create_user(&self, input: &NewUser) -> StoreResult<User>;

    async fn find_external_account(
        &self,
        user_id: i64,
        provider_name: &str,
        provider_uid: &str,
    ) -> StoreResult<Option<ExternalAccountLink>>;

    /// Insert a link. Fails with `Conflict(ExternalAccount)` when the
    /// provider subject is already linked.
    async fn create_external_account(
        &self,
        input: &NewExternalAccount,
    ) -> StoreResult<ExternalAccountLink>;
}

/// Categories, tags, topics, posts, custom fields, and like counts.
#[async_trait]
pub trait TopicStore: Send + Sync {
    /// All categories ordered by id.
    async fn list_categories(&self) -> StoreResult<Vec<Category>>;

    /// Exact, case-sensitive get-or-create.
    async fn find_or_create_tag(&self, name: &str) -> StoreResult<Lookup<Tag>>;

    /// Validate and insert a topic with its tags.
    async fn create_topic(&self, input: &NewTopic) -> StoreResult<Topic>;

    async fn find_topic(&self, id: i64) -> StoreResult<Option<Topic>>;

    async fn list_latest_topics(&self, limit: i64) -> StoreResult<Vec<Topic>>;

    async fn list_topics_by_user(&self, user_id: i64, limit: i64) -> StoreResult<Vec<Topic>>;

    async fn topic_tags(&self, topic_id: i64) -> StoreResult<Vec<Tag>>;

    /// Validate and append a post; the first post of a topic gets number 1.
    async fn create_post(&self, input: &NewPost) -> StoreResult<Post>;

    async fn first_post(&self, topic_id: i64) -> StoreResult<Option<Post>>;

    async fn first_posts(&self, topic_ids: &[i64]) -> StoreResult<HashMap<i64, Post>>;

    async fn set_topic_custom_field(&self, topic_id: i64, name: &str, value: &str)
    -> StoreResult<()>;

    async fn topic_custom_field(&self, topic_id: i64, name: &str) -> StoreResult<Option<String>>;

    /// Bulk read of one custom field; topics without it are absent.
    async fn topic_custom_fields(
        &self,
        topic_ids: &[i64],
        name: &str,
    ) -> StoreResult<HashMap<i64, String>>;

    async fn count_topic_likes(&self, topic_id: i64) -> StoreResult<i64>;

    /// Bulk like counts; topics without likes are absent.
    async fn count_topic_likes_bulk(&self, topic_ids: &[i64]) -> StoreResult<HashMap<i64, i64>>;
}

/// Operator-adjustable site settings.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn site_setting(&self, name: &str) -> StoreResult<Option<serde_json::Value>>;

    async fn set_site_setting(&self, name: &str, value: &serde_json::Value) -> StoreResult<()>;
}

/// A complete forum backend.
#[async_trait]
pub trait ForumStore: UserStore + TopicStore + SettingsStore {
    /// Check that the backend is reachable.
    async fn healthy(&self) -> bool;

    /// Short name for logs (e.g., "postgres", "memory").
    fn backend(&self) -> &'static str;
}
