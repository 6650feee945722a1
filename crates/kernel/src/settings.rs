//! Site settings resolved per request.
//!
//! Operators may override the configured defaults by writing rows into the
//! `site_settings` table. A snapshot is taken once per request so every
//! component sees the same values.

use serde_json::Value;

use crate::config::{Config, parse_bool};
use crate::store::{SettingsStore, StoreResult};

pub const REPORT_API_ENABLED: &str = "report_api_enabled";
pub const REPORT_API_KEY: &str = "report_api_key";
pub const REPORT_URL_ENABLED: &str = "report_url_enabled";

/// Settings the report plugins read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteSettings {
    pub report_api_enabled: bool,
    pub report_api_key: String,
    pub report_url_enabled: bool,
}

impl SiteSettings {
    /// Config defaults with no overrides applied.
    pub fn from_config(config: &Config) -> Self {
        Self {
            report_api_enabled: config.report_api_enabled,
            report_api_key: config.report_api_key.clone(),
            report_url_enabled: config.report_url_enabled,
        }
    }

    /// Resolve settings: stored overrides win over config defaults.
    ///
    /// Overrides that cannot be interpreted are ignored with a warning.
    pub async fn resolve(config: &Config, store: &dyn SettingsStore) -> StoreResult<Self> {
        let mut settings = Self::from_config(config);

        if let Some(value) = store.site_setting(REPORT_API_ENABLED).await? {
            override_bool(&mut settings.report_api_enabled, REPORT_API_ENABLED, &value);
        }
        if let Some(value) = store.site_setting(REPORT_URL_ENABLED).await? {
            override_bool(&mut settings.report_url_enabled, REPORT_URL_ENABLED, &value);
        }
        if let Some(value) = store.site_setting(REPORT_API_KEY).await? {
            match value {
                Value::String(key) => settings.report_api_key = key,
                Value::Null => settings.report_api_key.clear(),
                other => {
                    tracing::warn!(setting = REPORT_API_KEY, value = %other, "ignoring non-string override");
                }
            }
        }

        Ok(settings)
    }
}

fn override_bool(target: &mut bool, name: &str, value: &Value) {
    let parsed = match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => parse_bool(s).ok(),
        _ => None,
    };

    match parsed {
        Some(b) => *target = b,
        None => tracing::warn!(setting = name, value = %value, "ignoring non-boolean override"),
    }
}
