//! External account links: users tied to an identity provider's subject id.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// Association between a user and an external identity provider subject.
///
/// `(provider_name, provider_uid)` is unique across all users.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ExternalAccountLink {
    pub id: i64,
    pub user_id: i64,
    pub provider_name: String,
    pub provider_uid: String,
    /// Denormalized profile data: `{ "name": ..., "image": ... }`.
    pub info: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Input for creating an external account link.
#[derive(Debug, Clone)]
pub struct NewExternalAccount {
    pub user_id: i64,
    pub provider_name: String,
    pub provider_uid: String,
    pub name: Option<String>,
    pub image: Option<String>,
}

impl NewExternalAccount {
    /// Profile blob stored alongside the link.
    pub fn info(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "image": self.image,
        })
    }
}

impl ExternalAccountLink {
    /// Find the link for an exact (user, provider, subject) triple.
    pub async fn find(
        pool: &PgPool,
        user_id: i64,
        provider_name: &str,
        provider_uid: &str,
    ) -> Result<Option<Self>> {
        let link = sqlx::query_as::<_, ExternalAccountLink>(
            r#"
            SELECT * FROM user_associated_accounts
            WHERE user_id = $1 AND provider_name = $2 AND provider_uid = $3
            "#,
        )
        .bind(user_id)
        .bind(provider_name)
        .bind(provider_uid)
        .fetch_optional(pool)
        .await
        .context("failed to fetch external account link")?;

        Ok(link)
    }

    /// Create a link.
    pub async fn create(pool: &PgPool, input: &NewExternalAccount) -> Result<Self> {
        let link = sqlx::query_as::<_, ExternalAccountLink>(
            r#"
            INSERT INTO user_associated_accounts (user_id, provider_name, provider_uid, info)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(input.user_id)
        .bind(&input.provider_name)
        .bind(&input.provider_uid)
        .bind(input.info())
        .fetch_one(pool)
        .await
        .context("failed to create external account link")?;

        Ok(link)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn info_keeps_missing_fields_as_null() {
        let input = NewExternalAccount {
            user_id: 1,
            provider_name: "oidc".to_string(),
            provider_uid: "sub-1".to_string(),
            name: Some("Ada".to_string()),
            image: None,
        };
        assert_eq!(
            input.info(),
            serde_json::json!({ "name": "Ada", "image": null })
        );
    }
}
