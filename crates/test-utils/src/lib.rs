//! Forum bridge test utilities.
//!
//! Fixtures for integration testing: report payload and identity builders,
//! and assertion helpers for JSON responses.

use serde_json::{Value as JsonValue, json};

/// Create a report payload with default values.
pub fn test_report(id: &str, title: &str) -> TestReport {
    TestReport {
        id: json!(id),
        title: title.to_string(),
        description: format!("Description of {title}"),
        content_type: None,
        tags: None,
        report_url: None,
        user_info: test_identity(&format!("subject-{id}")).into_json(),
        removed: vec![],
    }
}

/// A report payload builder.
#[derive(Debug, Clone)]
pub struct TestReport {
    pub id: JsonValue,
    pub title: String,
    pub description: String,
    pub content_type: Option<String>,
    pub tags: Option<Vec<String>>,
    pub report_url: Option<String>,
    pub user_info: JsonValue,
    removed: Vec<String>,
}

impl TestReport {
    /// Set the report id to any JSON value (e.g., a number).
    pub fn with_id(mut self, id: JsonValue) -> Self {
        self.id = id;
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Set the content type.
    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_string());
        self
    }

    /// Set tag names.
    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = Some(tags.iter().map(|t| t.to_string()).collect());
        self
    }

    /// Set the report URL.
    pub fn with_report_url(mut self, url: &str) -> Self {
        self.report_url = Some(url.to_string());
        self
    }

    /// Set the identity payload.
    pub fn with_user_info(mut self, user_info: JsonValue) -> Self {
        self.user_info = user_info;
        self
    }

    /// Drop a top-level key from the rendered payload.
    pub fn without(mut self, key: &str) -> Self {
        self.removed.push(key.to_string());
        self
    }

    /// Render the JSON body.
    pub fn into_json(self) -> JsonValue {
        let mut body = json!({
            "id": self.id,
            "title": self.title,
            "description": self.description,
            "user_info": self.user_info,
        });

        if let Some(obj) = body.as_object_mut() {
            if let Some(content_type) = self.content_type {
                obj.insert("content_type".to_string(), json!(content_type));
            }
            if let Some(tags) = self.tags {
                obj.insert("tags".to_string(), json!(tags));
            }
            if let Some(report_url) = self.report_url {
                obj.insert("report_url".to_string(), json!(report_url));
            }
            for key in &self.removed {
                obj.remove(key);
            }
        }

        body
    }
}

/// Create an identity payload for a provider subject.
pub fn test_identity(subject: &str) -> TestIdentity {
    TestIdentity {
        subject: Some(subject.to_string()),
        email: None,
        name: None,
        given_name: None,
        picture: None,
        username: None,
    }
}

/// An identity payload builder.
#[derive(Debug, Clone)]
pub struct TestIdentity {
    pub subject: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub given_name: Option<String>,
    pub picture: Option<String>,
    pub username: Option<String>,
}

impl TestIdentity {
    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_given_name(mut self, given_name: &str) -> Self {
        self.given_name = Some(given_name.to_string());
        self
    }

    pub fn with_picture(mut self, picture: &str) -> Self {
        self.picture = Some(picture.to_string());
        self
    }

    pub fn with_username(mut self, username: &str) -> Self {
        self.username = Some(username.to_string());
        self
    }

    /// Remove the provider subject.
    pub fn without_subject(mut self) -> Self {
        self.subject = None;
        self
    }

    /// Render the JSON object; absent fields are omitted.
    pub fn into_json(self) -> JsonValue {
        let fields = [
            ("authing_user_id", self.subject),
            ("email", self.email),
            ("name", self.name),
            ("given_name", self.given_name),
            ("picture", self.picture),
            ("username", self.username),
        ];

        JsonValue::Object(
            fields
                .into_iter()
                .filter_map(|(key, value)| value.map(|v| (key.to_string(), json!(v))))
                .collect(),
        )
    }
}

/// Assertion helpers for JSON content.
pub mod assert {
    use serde_json::Value;

    /// Assert that a JSON value has a specific key.
    pub fn has_key(value: &Value, key: &str) {
        assert!(
            value.get(key).is_some(),
            "Expected JSON to have key '{key}', got: {value}"
        );
    }

    /// Assert that a JSON value lacks a specific key.
    pub fn lacks_key(value: &Value, key: &str) {
        assert!(
            value.get(key).is_none(),
            "Expected JSON to lack key '{key}', got: {value}"
        );
    }

    /// Assert that an error body carries the expected message.
    pub fn error_message(body: &Value, expected: &str) {
        assert_eq!(
            body.get("error").and_then(Value::as_str),
            Some(expected),
            "Unexpected error body: {body}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_defaults_have_required_fields() {
        let body = test_report("r1", "Title").into_json();
        assert::has_key(&body, "id");
        assert::has_key(&body, "title");
        assert::has_key(&body, "description");
        assert_eq!(body["user_info"]["authing_user_id"], "subject-r1");
        assert::lacks_key(&body, "tags");
    }

    #[test]
    fn without_removes_key() {
        let body = test_report("r1", "Title").without("title").into_json();
        assert::lacks_key(&body, "title");
    }

    #[test]
    fn identity_omits_absent_fields() {
        let info = test_identity("s").without_subject().with_email("a@b.c").into_json();
        assert::lacks_key(&info, "authing_user_id");
        assert_eq!(info["email"], "a@b.c");
    }
}
