//! User model and persistence queries.

use anyhow::{Context, Result};
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHasher};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// Trust level granting baseline posting privileges.
pub const TRUST_LEVEL_BASIC: i16 = 1;

/// User record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub username_lower: String,
    pub name: String,
    /// Primary email, stored lower-cased.
    pub email: String,
    pub active: bool,
    pub approved: bool,
    pub trust_level: i16,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a new user.
///
/// Carries an already hashed password; the plain text never reaches storage.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub name: String,
    pub email: String,
    pub active: bool,
    pub approved: bool,
    pub trust_level: i16,
    pub password_hash: String,
}

impl User {
    /// Find a user by username (case-insensitive).
    pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username_lower = $1")
            .bind(username.to_lowercase())
            .fetch_optional(pool)
            .await
            .context("failed to fetch user by username")?;

        Ok(user)
    }

    /// Find a user by primary email. The caller passes a normalized address.
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(pool)
            .await
            .context("failed to fetch user by email")?;

        Ok(user)
    }

    /// Check whether a username is taken (case-insensitive).
    pub async fn username_exists(pool: &PgPool, username: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username_lower = $1)")
                .bind(username.to_lowercase())
                .fetch_one(pool)
                .await
                .context("failed to check username")?;

        Ok(exists)
    }

    /// Create a new user.
    pub async fn create(pool: &PgPool, input: &NewUser) -> Result<Self> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users
                (username, username_lower, name, email, active, approved, trust_level, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(&input.username)
        .bind(input.username.to_lowercase())
        .bind(&input.name)
        .bind(&input.email)
        .bind(input.active)
        .bind(input.approved)
        .bind(input.trust_level)
        .bind(&input.password_hash)
        .fetch_one(pool)
        .await
        .context("failed to create user")?;

        Ok(user)
    }
}

/// Normalize an email for lookup and storage: trimmed and lower-cased.
///
/// Returns `None` for blank input.
pub fn normalize_email(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hashing() {
        let hash = hash_password("test_password_123").unwrap();

        // Hash should start with Argon2 identifier
        assert!(hash.starts_with("$argon2id$"));

        // Fresh salt per call
        assert_ne!(hash, hash_password("test_password_123").unwrap());
    }

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(
            normalize_email("  Test@Example.COM "),
            Some("test@example.com".to_string())
        );
        assert_eq!(normalize_email("   "), None);
    }

    #[test]
    fn serialized_user_hides_secrets() {
        let user = User {
            id: 7,
            username: "Bob".to_string(),
            username_lower: "bob".to_string(),
            name: "Bob".to_string(),
            email: "bob@example.com".to_string(),
            active: true,
            approved: true,
            trust_level: 1,
            password_hash: "$argon2id$secret".to_string(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("username_lower").is_none());
        assert_eq!(json["username"], "Bob");
    }
}
