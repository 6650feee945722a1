//! Content validation rules applied before topics and posts are persisted.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Length limits for topic titles and post bodies, counted in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPolicy {
    pub min_title_length: usize,
    pub max_title_length: usize,
    pub min_post_length: usize,
    pub max_post_length: usize,
}

impl Default for ContentPolicy {
    fn default() -> Self {
        Self {
            min_title_length: 2,
            max_title_length: 255,
            min_post_length: 1,
            max_post_length: 32_000,
        }
    }
}

impl ContentPolicy {
    /// Check a topic title against the configured limits.
    pub fn check_title(&self, title: &str, errors: &mut ValidationErrors) {
        let len = title.trim().chars().count();
        if len < self.min_title_length {
            errors.push(format!(
                "Title is too short (minimum is {} characters)",
                self.min_title_length
            ));
        } else if len > self.max_title_length {
            errors.push(format!(
                "Title is too long (maximum is {} characters)",
                self.max_title_length
            ));
        }
    }

    /// Check a post body against the configured limits.
    pub fn check_raw(&self, raw: &str, errors: &mut ValidationErrors) {
        let len = raw.trim().chars().count();
        if len < self.min_post_length {
            errors.push(format!(
                "Body is too short (minimum is {} characters)",
                self.min_post_length
            ));
        } else if len > self.max_post_length {
            errors.push(format!(
                "Body is too long (maximum is {} characters)",
                self.max_post_length
            ));
        }
    }
}

/// Accumulated validation messages for a single record.
///
/// Displays as `Validation failed: <msg>, <msg>`, the form the report API
/// strips when it surfaces the failure to callers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    messages: Vec<String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Convert into a `Result`, failing when any message was recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed: {}", self.messages.join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn title_length_counts_characters_not_bytes() {
        let policy = ContentPolicy {
            min_title_length: 4,
            ..ContentPolicy::default()
        };
        let mut errors = ValidationErrors::new();
        policy.check_title("测试报告", &mut errors);
        assert!(errors.is_empty());

        policy.check_title("测试", &mut errors);
        assert_eq!(
            errors.messages(),
            ["Title is too short (minimum is 4 characters)"]
        );
    }

    #[test]
    fn display_carries_framework_prefix() {
        let mut errors = ValidationErrors::new();
        errors.push("Title is too long (maximum is 5 characters)");
        errors.push("Body is too short (minimum is 1 characters)");
        assert_eq!(
            errors.to_string(),
            "Validation failed: Title is too long (maximum is 5 characters), \
             Body is too short (minimum is 1 characters)"
        );
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn whitespace_only_body_is_too_short() {
        let mut errors = ValidationErrors::new();
        ContentPolicy::default().check_raw("   \n", &mut errors);
        assert!(!errors.is_empty());
    }
}
