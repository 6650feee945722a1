//! Configuration loaded from environment variables.

use std::env;

use anyhow::{Context, Result};

use crate::models::ContentPolicy;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Default for the `report_api_enabled` site setting (default: true).
    pub report_api_enabled: bool,

    /// Default for the `report_api_key` site setting (default: empty, which
    /// rejects every request).
    pub report_api_key: String,

    /// Default for the `report_url_enabled` site setting (default: true).
    pub report_url_enabled: bool,

    /// Domain used for synthesized placeholder emails (default: example.com).
    pub placeholder_email_domain: String,

    /// Display name given to provisioned users that supply none (default: 用户).
    pub default_display_name: String,

    /// Topic title and post body length limits.
    pub content_policy: ContentPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            database_url: String::new(),
            database_max_connections: 10,
            report_api_enabled: true,
            report_api_key: String::new(),
            report_url_enabled: true,
            placeholder_email_domain: "example.com".to_string(),
            default_display_name: "用户".to_string(),
            content_policy: ContentPolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let port = env::var("PORT")
            .unwrap_or_else(|_| defaults.port.to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let database_url =
            env::var("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| defaults.database_max_connections.to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let report_api_enabled = match env::var("REPORT_API_ENABLED") {
            Ok(v) => parse_bool(&v).context("REPORT_API_ENABLED must be a boolean")?,
            Err(_) => defaults.report_api_enabled,
        };

        let report_api_key = env::var("REPORT_API_KEY").unwrap_or_default();

        let report_url_enabled = match env::var("REPORT_URL_ENABLED") {
            Ok(v) => parse_bool(&v).context("REPORT_URL_ENABLED must be a boolean")?,
            Err(_) => defaults.report_url_enabled,
        };

        let placeholder_email_domain = env::var("PLACEHOLDER_EMAIL_DOMAIN")
            .map(|v| v.trim().to_string())
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.placeholder_email_domain);

        let default_display_name = env::var("DEFAULT_DISPLAY_NAME")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.default_display_name);

        let policy = defaults.content_policy;
        let content_policy = ContentPolicy {
            min_title_length: env_usize("MIN_TOPIC_TITLE_LENGTH", policy.min_title_length)?,
            max_title_length: env_usize("MAX_TOPIC_TITLE_LENGTH", policy.max_title_length)?,
            min_post_length: env_usize("MIN_POST_LENGTH", policy.min_post_length)?,
            max_post_length: env_usize("MAX_POST_LENGTH", policy.max_post_length)?,
        };

        if content_policy.min_title_length > content_policy.max_title_length {
            anyhow::bail!("MIN_TOPIC_TITLE_LENGTH must not exceed MAX_TOPIC_TITLE_LENGTH");
        }
        if content_policy.min_post_length > content_policy.max_post_length {
            anyhow::bail!("MIN_POST_LENGTH must not exceed MAX_POST_LENGTH");
        }

        Ok(Self {
            port,
            database_url,
            database_max_connections,
            report_api_enabled,
            report_api_key,
            report_url_enabled,
            placeholder_email_domain,
            default_display_name,
            content_policy,
        })
    }
}

/// Parse a boolean setting value as written in env files or site settings.
pub fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("invalid boolean value '{other}'"),
    }
}

fn env_usize(key: &str, default: usize) -> Result<usize> {
    match env::var(key) {
        Ok(v) => v
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a non-negative integer")),
        Err(_) => Ok(default),
    }
}
