//! Report intake endpoint.
//!
//! `POST /api/reports` accepts a report from an external system, resolves
//! or provisions the submitting user, and opens a topic for the report.
//! Requires the `X-API-Key` header.

use axum::{
    Extension, Json, Router,
    extract::{State, rejection::JsonRejection},
    middleware,
    routing::post,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::middleware::require_api_key;
use crate::services::identity::lenient_text;
use crate::services::{ReportDraft, UserInfo};
use crate::settings::SiteSettings;
use crate::state::AppState;

/// Report body as sent by the caller. Fields of the wrong type read as
/// absent so a malformed report is rejected as missing parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ReportPayload {
    #[serde(default, deserialize_with = "lenient_text")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub content_type: Option<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub report_url: Option<String>,
    #[serde(default)]
    pub user_info: Option<Value>,
}

/// Keep the string elements of an array; anything else reads as empty.
fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

/// A validated report.
#[derive(Debug, Clone)]
pub struct ReportRequest {
    /// Caller's report identifier. Logged, never deduplicated.
    pub id: String,
    pub title: String,
    pub description: String,
    pub content_type: Option<String>,
    pub tags: Vec<String>,
    pub report_url: Option<String>,
    pub user_info: UserInfo,
}

impl TryFrom<ReportPayload> for ReportRequest {
    type Error = AppError;

    /// `id`, `title`, `description`, and a non-empty `user_info` object are
    /// required.
    fn try_from(payload: ReportPayload) -> AppResult<Self> {
        let user_info = payload
            .user_info
            .filter(|info| info.as_object().is_some_and(|o| !o.is_empty()));

        let (Some(id), Some(title), Some(description), Some(user_info)) =
            (payload.id, payload.title, payload.description, user_info)
        else {
            return Err(AppError::MissingParameters);
        };

        Ok(Self {
            id,
            title,
            description,
            content_type: payload.content_type,
            tags: payload.tags,
            report_url: payload.report_url,
            user_info: UserInfo::from_json(&user_info),
        })
    }
}

impl ReportRequest {
    /// The parts of the report that become forum content.
    pub fn draft(&self) -> ReportDraft {
        ReportDraft {
            title: self.title.clone(),
            description: self.description.clone(),
            content_type: self.content_type.clone(),
            tags: self.tags.clone(),
            report_url: self.report_url.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub success: bool,
    pub topic_id: i64,
    pub topic_url: String,
    pub user_id: i64,
    pub username: String,
}

/// POST /api/reports: Create a topic from a report.
async fn create_report(
    State(state): State<AppState>,
    Extension(settings): Extension<SiteSettings>,
    payload: Result<Json<ReportPayload>, JsonRejection>,
) -> AppResult<Json<ReportResponse>> {
    if !settings.report_api_enabled {
        return Err(AppError::NotFound);
    }

    // Unparseable bodies are treated as carrying no fields.
    let payload = payload
        .map(|Json(payload)| payload)
        .unwrap_or_else(|rejection| {
            tracing::debug!(error = %rejection, "unreadable report body");
            ReportPayload::default()
        });
    let request = ReportRequest::try_from(payload)?;
    info!(report_id = %request.id, title = %request.title, "report received");

    let resolved = state.identity().resolve(&request.user_info).await?;
    let report = state
        .reports()
        .materialize(&resolved.user, &request.draft())
        .await?;

    info!(
        report_id = %request.id,
        topic_id = report.topic.id,
        user_id = resolved.user.id,
        outcome = ?resolved.outcome,
        "report accepted"
    );

    Ok(Json(ReportResponse {
        success: true,
        topic_id: report.topic.id,
        topic_url: report.topic.url(),
        user_id: resolved.user.id,
        username: resolved.user.username,
    }))
}

/// Create the report router.
pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/reports", post(create_report))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> Value {
        json!({
            "id": "r-1",
            "title": "Broken link",
            "description": "The link is broken",
            "user_info": { "authing_user_id": "sub-1" }
        })
    }

    fn parse(body: Value) -> AppResult<ReportRequest> {
        ReportRequest::try_from(serde_json::from_value::<ReportPayload>(body).unwrap())
    }

    #[test]
    fn accepts_minimal_payload() {
        let request = parse(payload()).unwrap();
        assert_eq!(request.id, "r-1");
        assert!(request.tags.is_empty());
        assert_eq!(request.user_info.subject.as_deref(), Some("sub-1"));
    }

    #[test]
    fn numeric_id_is_accepted() {
        let mut body = payload();
        body["id"] = json!(42);
        assert_eq!(parse(body).unwrap().id, "42");
    }

    #[test]
    fn each_required_field_is_checked() {
        for field in ["id", "title", "description", "user_info"] {
            let mut body = payload();
            body.as_object_mut().unwrap().remove(field);
            assert!(
                matches!(parse(body), Err(AppError::MissingParameters)),
                "{field} should be required"
            );
        }
    }

    #[test]
    fn blank_and_empty_values_count_as_missing() {
        let mut body = payload();
        body["title"] = json!("   ");
        assert!(parse(body).is_err());

        let mut body = payload();
        body["user_info"] = json!({});
        assert!(parse(body).is_err());

        let mut body = payload();
        body["user_info"] = json!("sub-1");
        assert!(parse(body).is_err());

        let mut body = payload();
        body["description"] = json!(["not", "text"]);
        assert!(parse(body).is_err());
    }

    #[test]
    fn non_string_tags_are_dropped() {
        let mut body = payload();
        body["tags"] = json!(["a", 1, null, "b"]);
        assert_eq!(parse(body).unwrap().tags, vec!["a", "b"]);

        let mut body = payload();
        body["tags"] = json!("a,b");
        assert!(parse(body).unwrap().tags.is_empty());
    }

    #[test]
    fn non_object_body_is_not_a_payload() {
        assert!(serde_json::from_value::<ReportPayload>(json!(["a"])).is_err());
    }
}
