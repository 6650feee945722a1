//! Report URL topic fields.
//!
//! Topics created with a `report_url` parameter keep it as a custom field.
//! Topic views pull three extra fields from here: the report URL, the total
//! like count across the topic's live posts, and the first post's raw text.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::models::{Post, Topic};
use crate::store::{StoreResult, TopicStore};

/// Custom field name holding the report URL.
pub const REPORT_URL_FIELD: &str = "report_url";

/// Extra fields serialized into topic views.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TopicExtraFields {
    pub report_url: Option<String>,
    pub total_likes_count: i64,
    pub topic_content: String,
}

/// Options passed along with a topic creation.
#[derive(Debug, Clone, Default)]
pub struct TopicCreateOpts {
    pub report_url: Option<String>,
}

/// Topic-creation parameters accepted on behalf of this extension.
pub fn permitted_create_params(enabled: bool) -> &'static [&'static str] {
    if enabled { &[REPORT_URL_FIELD] } else { &[] }
}

/// Extra fields for a batch of topics, loaded with one query per field.
#[derive(Debug, Default)]
pub struct PreloadedFields {
    report_urls: HashMap<i64, String>,
    likes: HashMap<i64, i64>,
    first_posts: HashMap<i64, Post>,
}

impl PreloadedFields {
    /// Fields for one topic; topics outside the batch get the empty value.
    pub fn get(&self, topic_id: i64) -> TopicExtraFields {
        TopicExtraFields {
            report_url: self.report_urls.get(&topic_id).cloned(),
            total_likes_count: self.likes.get(&topic_id).copied().unwrap_or(0),
            topic_content: self
                .first_posts
                .get(&topic_id)
                .map(|p| p.raw.clone())
                .unwrap_or_default(),
        }
    }
}

/// The report URL extension.
pub struct TopicFieldsExtension {
    store: Arc<dyn TopicStore>,
}

impl TopicFieldsExtension {
    pub fn new(store: Arc<dyn TopicStore>) -> Self {
        Self { store }
    }

    /// Store the report URL of a freshly created topic.
    ///
    /// Returns whether anything was written.
    pub async fn on_topic_created(
        &self,
        enabled: bool,
        topic: &Topic,
        opts: &TopicCreateOpts,
    ) -> StoreResult<bool> {
        let url = match opts.report_url.as_deref() {
            Some(url) if enabled && !url.trim().is_empty() => url,
            _ => return Ok(false),
        };

        self.store
            .set_topic_custom_field(topic.id, REPORT_URL_FIELD, url)
            .await?;
        debug!(topic_id = topic.id, "stored report url");
        Ok(true)
    }

    /// Extra fields for a single topic. Missing topics yield the empty value.
    pub async fn compute_extra_fields(&self, topic_id: i64) -> StoreResult<TopicExtraFields> {
        if self.store.find_topic(topic_id).await?.is_none() {
            return Ok(TopicExtraFields::default());
        }

        let report_url = self
            .store
            .topic_custom_field(topic_id, REPORT_URL_FIELD)
            .await?;
        let total_likes_count = self.store.count_topic_likes(topic_id).await?;
        let topic_content = self
            .store
            .first_post(topic_id)
            .await?
            .map(|p| p.raw)
            .unwrap_or_default();

        Ok(TopicExtraFields {
            report_url,
            total_likes_count,
            topic_content,
        })
    }

    /// Bulk-load extra fields for a topic list.
    pub async fn preload(&self, topic_ids: &[i64]) -> StoreResult<PreloadedFields> {
        if topic_ids.is_empty() {
            return Ok(PreloadedFields::default());
        }

        Ok(PreloadedFields {
            report_urls: self
                .store
                .topic_custom_fields(topic_ids, REPORT_URL_FIELD)
                .await?,
            likes: self.store.count_topic_likes_bulk(topic_ids).await?,
            first_posts: self.store.first_posts(topic_ids).await?,
        })
    }
}
