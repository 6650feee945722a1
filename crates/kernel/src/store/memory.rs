//! In-memory forum store.
//!
//! Mirrors the PostgreSQL schema's constraints (unique usernames, emails,
//! provider subjects, and tag names) so behaviour matches production. Used
//! by the test suite and for running the server without a database.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use super::{
    ForumStore, SettingsStore, StoreError, StoreResult, TopicStore, UniqueField, UserStore,
};
use crate::models::post::POST_TYPE_REGULAR;
use crate::models::topic::slug_for;
use crate::models::{
    Category, ContentPolicy, ExternalAccountLink, Lookup, NewExternalAccount, NewPost, NewTopic,
    NewUser, Post, Tag, Topic, User,
};

#[derive(Debug, Clone)]
struct Like {
    post_id: i64,
    deleted: bool,
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: Vec<User>,
    external_accounts: Vec<ExternalAccountLink>,
    categories: Vec<Category>,
    tags: Vec<Tag>,
    topics: Vec<Topic>,
    /// (topic_id, tag_id) in attachment order.
    topic_tags: Vec<(i64, i64)>,
    custom_fields: HashMap<(i64, String), String>,
    posts: Vec<Post>,
    likes: Vec<Like>,
    settings: HashMap<String, serde_json::Value>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Forum store holding all records in process memory.
pub struct MemoryForumStore {
    policy: ContentPolicy,
    tables: RwLock<Tables>,
}

impl Default for MemoryForumStore {
    fn default() -> Self {
        Self::new(ContentPolicy::default())
    }
}

impl MemoryForumStore {
    pub fn new(policy: ContentPolicy) -> Self {
        Self {
            policy,
            tables: RwLock::new(Tables::default()),
        }
    }

    /// Add a category, as the host's admin UI would.
    pub fn add_category(&self, name: &str, read_restricted: bool) -> Category {
        let mut tables = self.tables.write();
        let category = Category {
            id: tables.next_id(),
            name: name.to_string(),
            read_restricted,
        };
        tables.categories.push(category.clone());
        category
    }

    /// Record a like on a post, as the reaction subsystem would.
    pub fn like_post(&self, post_id: i64) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if !tables.posts.iter().any(|p| p.id == post_id) {
            return Err(StoreError::NotFound("Post"));
        }
        tables.likes.push(Like {
            post_id,
            deleted: false,
        });
        Ok(())
    }

    /// Withdraw every like on a post.
    pub fn unlike_post(&self, post_id: i64) {
        let mut tables = self.tables.write();
        for like in tables.likes.iter_mut().filter(|l| l.post_id == post_id) {
            like.deleted = true;
        }
    }

    /// Soft-delete a post.
    pub fn delete_post(&self, post_id: i64) {
        let mut tables = self.tables.write();
        if let Some(post) = tables.posts.iter_mut().find(|p| p.id == post_id) {
            post.deleted_at = Some(Utc::now());
        }
    }

    pub fn user_count(&self) -> usize {
        self.tables.read().users.len()
    }

    pub fn topic_count(&self) -> usize {
        self.tables.read().topics.len()
    }

    pub fn post_count(&self) -> usize {
        self.tables.read().posts.len()
    }

    pub fn tag_count(&self) -> usize {
        self.tables.read().tags.len()
    }

    /// All external account links, in creation order.
    pub fn external_accounts(&self) -> Vec<ExternalAccountLink> {
        self.tables.read().external_accounts.clone()
    }
}

#[async_trait]
impl UserStore for MemoryForumStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read();
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let lower = username.to_lowercase();
        let tables = self.tables.read();
        Ok(tables
            .users
            .iter()
            .find(|u| u.username_lower == lower)
            .cloned())
    }

    async fn username_exists(&self, username: &str) -> StoreResult<bool> {
        let lower = username.to_lowercase();
        let tables = self.tables.read();
        Ok(tables.users.iter().any(|u| u.username_lower == lower))
    }

    async fn create_user(&self, input: &NewUser) -> StoreResult<User> {
        let username_lower = input.username.to_lowercase();
        let mut tables = self.tables.write();

        if tables.users.iter().any(|u| u.username_lower == username_lower) {
            return Err(StoreError::Conflict(UniqueField::Username));
        }
        if tables.users.iter().any(|u| u.email == input.email) {
            return Err(StoreError::Conflict(UniqueField::Email));
        }

        let user = User {
            id: tables.next_id(),
            username: input.username.clone(),
            username_lower,
            name: input.name.clone(),
            email: input.email.clone(),
            active: input.active,
            approved: input.approved,
            trust_level: input.trust_level,
            password_hash: input.password_hash.clone(),
            created_at: Utc::now(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn find_external_account(
        &self,
        user_id: i64,
        provider_name: &str,
        provider_uid: &str,
    ) -> StoreResult<Option<ExternalAccountLink>> {
        let tables = self.tables.read();
        Ok(tables
            .external_accounts
            .iter()
            .find(|l| {
                l.user_id == user_id
                    && l.provider_name == provider_name
                    && l.provider_uid == provider_uid
            })
            .cloned())
    }

    async fn create_external_account(
        &self,
        input: &NewExternalAccount,
    ) -> StoreResult<ExternalAccountLink> {
        let mut tables = self.tables.write();

        if tables
            .external_accounts
            .iter()
            .any(|l| l.provider_name == input.provider_name && l.provider_uid == input.provider_uid)
        {
            return Err(StoreError::Conflict(UniqueField::ExternalAccount));
        }
        if !tables.users.iter().any(|u| u.id == input.user_id) {
            return Err(StoreError::NotFound("User"));
        }

        let link = ExternalAccountLink {
            id: tables.next_id(),
            user_id: input.user_id,
            provider_name: input.provider_name.clone(),
            provider_uid: input.provider_uid.clone(),
            info: input.info(),
            created_at: Utc::now(),
        };
        tables.external_accounts.push(link.clone());
        Ok(link)
    }
}

#[async_trait]
impl TopicStore for MemoryForumStore {
    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let mut categories = self.tables.read().categories.clone();
        categories.sort_by_key(|c| c.id);
        Ok(categories)
    }

    async fn find_or_create_tag(&self, name: &str) -> StoreResult<Lookup<Tag>> {
        let mut tables = self.tables.write();
        if let Some(tag) = tables.tags.iter().find(|t| t.name == name) {
            return Ok(Lookup::Found(tag.clone()));
        }
        let tag = Tag {
            id: tables.next_id(),
            name: name.to_string(),
        };
        tables.tags.push(tag.clone());
        Ok(Lookup::Created(tag))
    }

    async fn create_topic(&self, input: &NewTopic) -> StoreResult<Topic> {
        input.validate(&self.policy)?;

        let mut tables = self.tables.write();
        if !tables.users.iter().any(|u| u.id == input.user_id) {
            return Err(StoreError::NotFound("User"));
        }

        let topic = Topic {
            id: tables.next_id(),
            title: input.title.trim().to_string(),
            slug: slug_for(&input.title),
            user_id: input.user_id,
            category_id: input.category_id,
            last_post_user_id: input.user_id,
            posts_count: 0,
            created_at: Utc::now(),
        };
        for tag_id in &input.tag_ids {
            let pair = (topic.id, *tag_id);
            if !tables.topic_tags.contains(&pair) {
                tables.topic_tags.push(pair);
            }
        }
        tables.topics.push(topic.clone());
        Ok(topic)
    }

    async fn find_topic(&self, id: i64) -> StoreResult<Option<Topic>> {
        let tables = self.tables.read();
        Ok(tables.topics.iter().find(|t| t.id == id).cloned())
    }

    async fn list_latest_topics(&self, limit: i64) -> StoreResult<Vec<Topic>> {
        let tables = self.tables.read();
        let mut topics = tables.topics.clone();
        topics.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        topics.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(topics)
    }

    async fn list_topics_by_user(&self, user_id: i64, limit: i64) -> StoreResult<Vec<Topic>> {
        let tables = self.tables.read();
        let mut topics: Vec<Topic> = tables
            .topics
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        topics.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        topics.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(topics)
    }

    async fn topic_tags(&self, topic_id: i64) -> StoreResult<Vec<Tag>> {
        let tables = self.tables.read();
        Ok(tables
            .topic_tags
            .iter()
            .filter(|(t, _)| *t == topic_id)
            .filter_map(|(_, tag_id)| tables.tags.iter().find(|tag| tag.id == *tag_id))
            .cloned()
            .collect())
    }

    async fn create_post(&self, input: &NewPost) -> StoreResult<Post> {
        input.validate(&self.policy)?;

        let mut tables = self.tables.write();
        let id = tables.next_id();
        let topic = tables
            .topics
            .iter_mut()
            .find(|t| t.id == input.topic_id)
            .ok_or(StoreError::NotFound("Topic"))?;

        topic.posts_count += 1;
        topic.last_post_user_id = input.user_id;
        let post = Post {
            id,
            topic_id: input.topic_id,
            user_id: input.user_id,
            post_number: topic.posts_count,
            raw: input.raw.clone(),
            post_type: POST_TYPE_REGULAR,
            created_at: Utc::now(),
            deleted_at: None,
        };
        tables.posts.push(post.clone());
        Ok(post)
    }

    async fn first_post(&self, topic_id: i64) -> StoreResult<Option<Post>> {
        let tables = self.tables.read();
        Ok(tables
            .posts
            .iter()
            .find(|p| p.topic_id == topic_id && p.post_number == 1 && p.deleted_at.is_none())
            .cloned())
    }

    async fn first_posts(&self, topic_ids: &[i64]) -> StoreResult<HashMap<i64, Post>> {
        let tables = self.tables.read();
        Ok(tables
            .posts
            .iter()
            .filter(|p| {
                topic_ids.contains(&p.topic_id) && p.post_number == 1 && p.deleted_at.is_none()
            })
            .map(|p| (p.topic_id, p.clone()))
            .collect())
    }

    async fn set_topic_custom_field(
        &self,
        topic_id: i64,
        name: &str,
        value: &str,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if !tables.topics.iter().any(|t| t.id == topic_id) {
            return Err(StoreError::NotFound("Topic"));
        }
        tables
            .custom_fields
            .insert((topic_id, name.to_string()), value.to_string());
        Ok(())
    }

    async fn topic_custom_field(&self, topic_id: i64, name: &str) -> StoreResult<Option<String>> {
        let tables = self.tables.read();
        Ok(tables
            .custom_fields
            .get(&(topic_id, name.to_string()))
            .cloned())
    }

    async fn topic_custom_fields(
        &self,
        topic_ids: &[i64],
        name: &str,
    ) -> StoreResult<HashMap<i64, String>> {
        let tables = self.tables.read();
        Ok(topic_ids
            .iter()
            .filter_map(|id| {
                tables
                    .custom_fields
                    .get(&(*id, name.to_string()))
                    .map(|v| (*id, v.clone()))
            })
            .collect())
    }

    async fn count_topic_likes(&self, topic_id: i64) -> StoreResult<i64> {
        let counts = self.count_topic_likes_bulk(&[topic_id]).await?;
        Ok(counts.get(&topic_id).copied().unwrap_or(0))
    }

    async fn count_topic_likes_bulk(&self, topic_ids: &[i64]) -> StoreResult<HashMap<i64, i64>> {
        let tables = self.tables.read();
        let mut counts: HashMap<i64, i64> = HashMap::new();
        for like in tables.likes.iter().filter(|l| !l.deleted) {
            let live_post = tables
                .posts
                .iter()
                .find(|p| p.id == like.post_id && p.deleted_at.is_none());
            if let Some(post) = live_post {
                if topic_ids.contains(&post.topic_id) {
                    *counts.entry(post.topic_id).or_default() += 1;
                }
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl SettingsStore for MemoryForumStore {
    async fn site_setting(&self, name: &str) -> StoreResult<Option<serde_json::Value>> {
        Ok(self.tables.read().settings.get(name).cloned())
    }

    async fn set_site_setting(&self, name: &str, value: &serde_json::Value) -> StoreResult<()> {
        self.tables
            .write()
            .settings
            .insert(name.to_string(), value.clone());
        Ok(())
    }
}

#[async_trait]
impl ForumStore for MemoryForumStore {
    async fn healthy(&self) -> bool {
        true
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::user::TRUST_LEVEL_BASIC;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            name: username.to_string(),
            email: email.to_string(),
            active: true,
            approved: true,
            trust_level: TRUST_LEVEL_BASIC,
            password_hash: String::new(),
        }
    }

    #[tokio::test]
    async fn usernames_are_unique_ignoring_case() {
        let store = MemoryForumStore::default();
        store
            .create_user(&new_user("Bob", "bob@example.com"))
            .await
            .unwrap();

        assert!(store.username_exists("bob").await.unwrap());
        let err = store
            .create_user(&new_user("BOB", "other@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(UniqueField::Username)));
    }

    #[tokio::test]
    async fn emails_are_unique() {
        let store = MemoryForumStore::default();
        store
            .create_user(&new_user("a", "same@example.com"))
            .await
            .unwrap();
        let err = store
            .create_user(&new_user("b", "same@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(UniqueField::Email)));
    }

    #[tokio::test]
    async fn tags_are_case_sensitive() {
        let store = MemoryForumStore::default();
        assert!(store.find_or_create_tag("Rust").await.unwrap().was_created());
        assert!(!store.find_or_create_tag("Rust").await.unwrap().was_created());
        assert!(store.find_or_create_tag("rust").await.unwrap().was_created());
        assert_eq!(store.tag_count(), 2);
    }

    #[tokio::test]
    async fn posts_are_numbered_and_likes_counted() {
        let store = MemoryForumStore::default();
        let user = store
            .create_user(&new_user("poster", "poster@example.com"))
            .await
            .unwrap();
        let topic = store
            .create_topic(&NewTopic {
                title: "Numbers".to_string(),
                user_id: user.id,
                category_id: 1,
                tag_ids: vec![],
            })
            .await
            .unwrap();

        let first = store
            .create_post(&NewPost {
                topic_id: topic.id,
                user_id: user.id,
                raw: "first".to_string(),
            })
            .await
            .unwrap();
        let second = store
            .create_post(&NewPost {
                topic_id: topic.id,
                user_id: user.id,
                raw: "second".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(first.post_number, 1);
        assert_eq!(second.post_number, 2);

        store.like_post(first.id).unwrap();
        store.like_post(second.id).unwrap();
        assert_eq!(store.count_topic_likes(topic.id).await.unwrap(), 2);

        store.delete_post(second.id);
        assert_eq!(store.count_topic_likes(topic.id).await.unwrap(), 1);

        store.unlike_post(first.id);
        assert_eq!(store.count_topic_likes(topic.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn post_on_missing_topic_is_not_found() {
        let store = MemoryForumStore::default();
        let err = store
            .create_post(&NewPost {
                topic_id: 99,
                user_id: 1,
                raw: "orphan".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound("Topic")));
    }
}
