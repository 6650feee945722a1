//! Topic read views and topic creation.
//!
//! Three views carry the report URL fields when that extension is enabled:
//! topic list items, the topic detail view, and user activity entries.

use std::collections::BTreeMap;

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::HeaderMap,
    middleware,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::middleware::require_api_key;
use crate::models::{NewPost, NewTopic, Topic};
use crate::services::report::{DEFAULT_CATEGORY_ID, choose_category};
use crate::services::topic_fields::{REPORT_URL_FIELD, permitted_create_params};
use crate::services::{TopicCreateOpts, TopicExtraFields};
use crate::settings::SiteSettings;
use crate::state::AppState;

/// Number of topics returned by list views.
const LIST_LIMIT: i64 = 30;

/// Activity type for "created a topic".
pub const NEW_TOPIC_ACTION: i32 = 4;

/// Header naming the user a key-authenticated request acts as.
pub const API_USERNAME_HEADER: &str = "api-username";

#[derive(Debug, Serialize)]
pub struct TopicListItem {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub category_id: i64,
    pub posts_count: i32,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extras: Option<TopicExtraFields>,
}

#[derive(Debug, Serialize)]
pub struct TopicDetail {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub url: String,
    pub user_id: i64,
    pub category_id: i64,
    pub posts_count: i32,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub custom_fields: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extras: Option<TopicExtraFields>,
}

#[derive(Debug, Serialize)]
pub struct UserActivityEntry {
    pub action_type: i32,
    pub topic_id: i64,
    pub title: String,
    pub slug: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extras: Option<TopicExtraFields>,
}

#[derive(Debug, Serialize)]
pub struct TopicListResponse {
    pub topics: Vec<TopicListItem>,
}

#[derive(Debug, Serialize)]
pub struct UserActivityResponse {
    pub user_actions: Vec<UserActivityEntry>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTopicRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub raw: String,
    pub category: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub report_url: Option<String>,
}

/// GET /api/topics: Latest topics.
async fn list_topics(
    State(state): State<AppState>,
    Extension(settings): Extension<SiteSettings>,
) -> AppResult<Json<TopicListResponse>> {
    let topics = state.topics().list_latest_topics(LIST_LIMIT).await?;

    let preloaded = if settings.report_url_enabled {
        let ids: Vec<i64> = topics.iter().map(|t| t.id).collect();
        Some(state.topic_fields().preload(&ids).await?)
    } else {
        None
    };

    let topics = topics
        .into_iter()
        .map(|topic| TopicListItem {
            extras: preloaded.as_ref().map(|p| p.get(topic.id)),
            id: topic.id,
            title: topic.title,
            slug: topic.slug,
            category_id: topic.category_id,
            posts_count: topic.posts_count,
            created_at: topic.created_at,
        })
        .collect();

    Ok(Json(TopicListResponse { topics }))
}

/// GET /api/topics/{id}: Topic detail.
async fn show_topic(
    State(state): State<AppState>,
    Extension(settings): Extension<SiteSettings>,
    Path(id): Path<i64>,
) -> AppResult<Json<TopicDetail>> {
    let topic = state
        .topics()
        .find_topic(id)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(Json(topic_detail(&state, &settings, topic).await?))
}

async fn topic_detail(
    state: &AppState,
    settings: &SiteSettings,
    topic: Topic,
) -> AppResult<TopicDetail> {
    let tags = state
        .topics()
        .topic_tags(topic.id)
        .await?
        .into_iter()
        .map(|t| t.name)
        .collect();

    let mut custom_fields = BTreeMap::new();
    if let Some(url) = state
        .topics()
        .topic_custom_field(topic.id, REPORT_URL_FIELD)
        .await?
    {
        custom_fields.insert(REPORT_URL_FIELD.to_string(), url);
    }

    let extras = if settings.report_url_enabled {
        Some(state.topic_fields().compute_extra_fields(topic.id).await?)
    } else {
        None
    };

    Ok(TopicDetail {
        url: topic.url(),
        id: topic.id,
        title: topic.title,
        slug: topic.slug,
        user_id: topic.user_id,
        category_id: topic.category_id,
        posts_count: topic.posts_count,
        created_at: topic.created_at,
        tags,
        custom_fields,
        extras,
    })
}

/// GET /api/users/{username}/activity: Topics a user has created.
async fn user_activity(
    State(state): State<AppState>,
    Extension(settings): Extension<SiteSettings>,
    Path(username): Path<String>,
) -> AppResult<Json<UserActivityResponse>> {
    let user = state
        .users()
        .find_user_by_username(&username)
        .await?
        .ok_or(AppError::NotFound)?;

    let topics = state
        .topics()
        .list_topics_by_user(user.id, LIST_LIMIT)
        .await?;

    let mut user_actions = Vec::with_capacity(topics.len());
    for topic in topics {
        let extras = if settings.report_url_enabled {
            Some(state.topic_fields().compute_extra_fields(topic.id).await?)
        } else {
            None
        };
        user_actions.push(UserActivityEntry {
            action_type: NEW_TOPIC_ACTION,
            topic_id: topic.id,
            title: topic.title,
            slug: topic.slug,
            username: user.username.clone(),
            created_at: topic.created_at,
            extras,
        });
    }

    Ok(Json(UserActivityResponse { user_actions }))
}

/// POST /api/topics: Create a topic with its first post.
async fn create_topic(
    State(state): State<AppState>,
    Extension(settings): Extension<SiteSettings>,
    headers: HeaderMap,
    Json(body): Json<CreateTopicRequest>,
) -> AppResult<Json<TopicDetail>> {
    if body.title.trim().is_empty() || body.raw.trim().is_empty() {
        return Err(AppError::MissingParameters);
    }

    let username = headers
        .get(API_USERNAME_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::UserNotRegistered)?;
    let author = state
        .users()
        .find_user_by_username(username)
        .await?
        .ok_or(AppError::UserNotRegistered)?;

    let category_id = match body.category {
        Some(id) => id,
        None => choose_category(&state.topics().list_categories().await?)
            .unwrap_or(DEFAULT_CATEGORY_ID),
    };

    let mut tag_ids = Vec::new();
    for name in body.tags.iter().filter(|n| !n.trim().is_empty()) {
        let tag = state.topics().find_or_create_tag(name).await?.into_inner();
        if !tag_ids.contains(&tag.id) {
            tag_ids.push(tag.id);
        }
    }

    let topic = state
        .topics()
        .create_topic(&NewTopic {
            title: body.title,
            user_id: author.id,
            category_id,
            tag_ids,
        })
        .await?;
    state
        .topics()
        .create_post(&NewPost {
            topic_id: topic.id,
            user_id: author.id,
            raw: body.raw,
        })
        .await?;

    let permitted = permitted_create_params(settings.report_url_enabled);
    let opts = TopicCreateOpts {
        report_url: body
            .report_url
            .filter(|_| permitted.contains(&REPORT_URL_FIELD)),
    };
    state
        .topic_fields()
        .on_topic_created(settings.report_url_enabled, &topic, &opts)
        .await?;

    info!(topic_id = topic.id, user_id = author.id, "topic created");

    Ok(Json(topic_detail(&state, &settings, topic).await?))
}

/// Create the topic router.
pub fn router(state: &AppState) -> Router<AppState> {
    let authenticated = Router::new()
        .route("/api/topics", post(create_topic))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    Router::new()
        .route("/api/topics", get(list_topics))
        .route("/api/topics/{id}", get(show_topic))
        .route("/api/users/{username}/activity", get(user_activity))
        .merge(authenticated)
}
