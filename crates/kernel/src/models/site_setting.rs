//! Site settings: operator overrides for configuration defaults.

use anyhow::{Context, Result};
use sqlx::PgPool;

/// Accessors for the `site_settings` key-value table.
pub struct SiteSetting;

impl SiteSetting {
    /// Get a setting value by name.
    pub async fn get(pool: &PgPool, name: &str) -> Result<Option<serde_json::Value>> {
        let result = sqlx::query_scalar::<_, serde_json::Value>(
            "SELECT value FROM site_settings WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("failed to get site setting")?;

        Ok(result)
    }

    /// Set a setting value.
    pub async fn set(pool: &PgPool, name: &str, value: &serde_json::Value) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO site_settings (name, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (name) DO UPDATE SET value = $2, updated_at = NOW()
            "#,
        )
        .bind(name)
        .bind(value)
        .execute(pool)
        .await
        .context("failed to set site setting")?;

        Ok(())
    }
}
