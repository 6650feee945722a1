//! Turns an accepted report into a topic with its opening post.

use std::sync::Arc;

use tracing::{info, warn};

use crate::models::{Category, NewPost, NewTopic, Post, Tag, Topic, User};
use crate::services::topic_fields::REPORT_URL_FIELD;
use crate::store::{StoreResult, TopicStore};

/// Category used when the forum has none at all.
pub const DEFAULT_CATEGORY_ID: i64 = 1;

/// Housekeeping categories reports are kept out of when possible.
const EXCLUDED_CATEGORY_NAMES: [&str; 3] = ["General", "Uncategorized", "Meta"];

/// Label placed before the content type in the post body.
const CONTENT_TYPE_LABEL: &str = "**内容类型：**";

/// The report fields the materializer consumes.
#[derive(Debug, Clone, Default)]
pub struct ReportDraft {
    pub title: String,
    pub description: String,
    pub content_type: Option<String>,
    pub tags: Vec<String>,
    pub report_url: Option<String>,
}

/// Records written for one report.
#[derive(Debug, Clone)]
pub struct MaterializedReport {
    pub topic: Topic,
    pub post: Post,
    pub tags: Vec<Tag>,
    pub category_id: i64,
}

/// Creates topics and posts for reports.
pub struct ReportMaterializer {
    store: Arc<dyn TopicStore>,
}

impl ReportMaterializer {
    pub fn new(store: Arc<dyn TopicStore>) -> Self {
        Self { store }
    }

    /// Write the topic, its tags, the report URL, and the opening post.
    ///
    /// Steps are not transactional: a failure part way leaves earlier
    /// records in place.
    pub async fn materialize(
        &self,
        author: &User,
        draft: &ReportDraft,
    ) -> StoreResult<MaterializedReport> {
        let categories = self.store.list_categories().await?;
        let category_id = choose_category(&categories).unwrap_or_else(|| {
            warn!(
                category_id = DEFAULT_CATEGORY_ID,
                "no categories found, using default"
            );
            DEFAULT_CATEGORY_ID
        });

        let mut tags = Vec::new();
        let mut created = 0usize;
        for name in unique_tag_names(&draft.tags) {
            let lookup = self.store.find_or_create_tag(name).await?;
            if lookup.was_created() {
                created += 1;
            }
            tags.push(lookup.into_inner());
        }

        let topic = self
            .store
            .create_topic(&NewTopic {
                title: draft.title.clone(),
                user_id: author.id,
                category_id,
                tag_ids: tags.iter().map(|t| t.id).collect(),
            })
            .await?;

        if let Some(url) = draft.report_url.as_deref().filter(|u| !u.trim().is_empty()) {
            self.store
                .set_topic_custom_field(topic.id, REPORT_URL_FIELD, url)
                .await?;
        }

        let post = self
            .store
            .create_post(&NewPost {
                topic_id: topic.id,
                user_id: author.id,
                raw: render_post_body(&draft.description, draft.content_type.as_deref()),
            })
            .await?;

        info!(
            topic_id = topic.id,
            post_id = post.id,
            category_id,
            tags = tags.len(),
            tags_created = created,
            "report materialized"
        );

        Ok(MaterializedReport {
            topic,
            post,
            tags,
            category_id,
        })
    }
}

/// First public, non-housekeeping category by id; else the first category.
pub fn choose_category(categories: &[Category]) -> Option<i64> {
    let mut sorted: Vec<&Category> = categories.iter().collect();
    sorted.sort_by_key(|c| c.id);

    sorted
        .iter()
        .find(|c| !c.read_restricted && !EXCLUDED_CATEGORY_NAMES.contains(&c.name.as_str()))
        .or_else(|| sorted.first())
        .map(|c| c.id)
}

/// Post body: the description, followed by the content type when present.
pub fn render_post_body(description: &str, content_type: Option<&str>) -> String {
    let mut parts = vec![description.to_string()];
    if let Some(content_type) = content_type.filter(|c| !c.trim().is_empty()) {
        parts.push(format!("\n\n{CONTENT_TYPE_LABEL} {content_type}"));
    }
    parts.join("\n")
}

/// Non-blank tag names, exactly as given, in first-seen order.
fn unique_tag_names(names: &[String]) -> Vec<&str> {
    let mut seen = Vec::new();
    for name in names
        .iter()
        .map(String::as_str)
        .filter(|n| !n.trim().is_empty())
    {
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn category(id: i64, name: &str, read_restricted: bool) -> Category {
        Category {
            id,
            name: name.to_string(),
            read_restricted,
        }
    }

    #[test]
    fn skips_housekeeping_and_restricted_categories() {
        let categories = vec![
            category(1, "Uncategorized", false),
            category(2, "Staff", true),
            category(3, "Meta", false),
            category(4, "Reports", false),
            category(5, "Other", false),
        ];
        assert_eq!(choose_category(&categories), Some(4));
    }

    #[test]
    fn falls_back_to_first_category() {
        let categories = vec![category(7, "General", false), category(3, "Meta", false)];
        assert_eq!(choose_category(&categories), Some(3));
        assert_eq!(choose_category(&[]), None);
    }

    #[test]
    fn body_without_content_type_is_description() {
        assert_eq!(render_post_body("Something broke", None), "Something broke");
        assert_eq!(render_post_body("Something broke", Some("  ")), "Something broke");
    }

    #[test]
    fn body_appends_content_type() {
        assert_eq!(
            render_post_body("Something broke", Some("bug")),
            "Something broke\n\n\n**内容类型：** bug"
        );
    }

    #[test]
    fn tag_names_are_deduplicated_in_order() {
        let names = vec![
            "b".to_string(),
            "a".to_string(),
            String::new(),
            "  ".to_string(),
            "b".to_string(),
        ];
        assert_eq!(unique_tag_names(&names), vec!["b", "a"]);
    }

    #[test]
    fn tag_names_are_not_trimmed() {
        let names = vec!["a".to_string(), " a ".to_string()];
        assert_eq!(unique_tag_names(&names), vec!["a", " a "]);
    }
}
