//! Identity resolution for report submitters.
//!
//! Maps an OIDC-style identity payload onto a forum user: match by email,
//! otherwise provision a new account with a unique username, and make sure
//! the `(user, "oidc", subject)` link exists. The payload is trusted; the API
//! key gate in front of the endpoint is the only authentication.

use std::sync::Arc;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::user::{TRUST_LEVEL_BASIC, hash_password, normalize_email};
use crate::models::{NewExternalAccount, NewUser, User};
use crate::store::{StoreError, UniqueField, UserStore};

/// Provider name recorded on external account links.
pub const PROVIDER_NAME: &str = "oidc";

/// Upper bound on username candidates tried for one resolution.
pub const MAX_USERNAME_ATTEMPTS: u32 = 100;

/// Errors from identity resolution.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The payload carries no provider subject.
    #[error("user not registered")]
    MissingSubject,

    /// Every username candidate was taken.
    #[error("no free username derived from '{0}'")]
    UsernamesExhausted(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0:#}")]
    Other(#[from] anyhow::Error),
}

/// The identity blob sent along with a report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserInfo {
    /// Provider subject (`authing_user_id`).
    #[serde(rename = "authing_user_id", default, deserialize_with = "lenient_text")]
    pub subject: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub given_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub picture: Option<String>,
    /// Desired forum username.
    #[serde(default, deserialize_with = "lenient_text")]
    pub username: Option<String>,
}

impl UserInfo {
    /// Read the known keys from a JSON object. Unknown keys are ignored and
    /// anything that is not an object yields an empty identity.
    pub fn from_json(value: &Value) -> Self {
        Self::deserialize(value).unwrap_or_default()
    }
}

/// Deserialize a text field leniently: blank strings count as absent,
/// numbers are accepted as text, other JSON types are ignored.
pub(crate) fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// How a user was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// An existing user owned the payload email.
    MatchedEmail,
    /// A new user was provisioned and linked.
    Created,
    /// Provisioning collided with an email taken concurrently; the owner was
    /// returned and no link was written.
    ReusedEmailOwner,
}

/// A resolved forum user.
#[derive(Debug, Clone)]
pub struct ResolvedUser {
    pub user: User,
    pub outcome: ResolveOutcome,
}

/// Finds or provisions forum users from identity payloads.
pub struct IdentityResolver {
    store: Arc<dyn UserStore>,
    placeholder_email_domain: String,
    default_display_name: String,
}

impl IdentityResolver {
    pub fn new(
        store: Arc<dyn UserStore>,
        placeholder_email_domain: impl Into<String>,
        default_display_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            placeholder_email_domain: placeholder_email_domain.into(),
            default_display_name: default_display_name.into(),
        }
    }

    /// Resolve the payload to a user, provisioning one if needed.
    pub async fn resolve(&self, info: &UserInfo) -> Result<ResolvedUser, IdentityError> {
        let subject = info
            .subject
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(IdentityError::MissingSubject)?;

        let email = info.email.as_deref().and_then(normalize_email);

        if let Some(email) = &email {
            if let Some(user) = self.store.find_user_by_email(email).await? {
                self.ensure_link(&user, subject, info).await?;
                debug!(user_id = user.id, "identity matched by email");
                return Ok(ResolvedUser {
                    user,
                    outcome: ResolveOutcome::MatchedEmail,
                });
            }
        }

        self.provision(subject, email, info).await
    }

    async fn provision(
        &self,
        subject: &str,
        email: Option<String>,
        info: &UserInfo,
    ) -> Result<ResolvedUser, IdentityError> {
        let base = base_username(info.username.as_deref(), email.as_deref());
        let password = hex::encode(rand::random::<[u8; 16]>());

        let mut new_user = NewUser {
            username: String::new(),
            name: self.display_name(info),
            email: email.clone().unwrap_or_else(|| self.placeholder_email()),
            active: true,
            approved: true,
            trust_level: TRUST_LEVEL_BASIC,
            password_hash: hash_password(&password)?,
        };

        let mut suffix: u32 = 0;
        for _ in 0..MAX_USERNAME_ATTEMPTS {
            let candidate = username_candidate(&base, suffix);
            if self.store.username_exists(&candidate).await? {
                suffix += 1;
                continue;
            }
            new_user.username = candidate;

            match self.store.create_user(&new_user).await {
                Ok(user) => {
                    self.store
                        .create_external_account(&self.link_for(&user, subject, info))
                        .await?;
                    info!(user_id = user.id, username = %user.username, "provisioned user");
                    return Ok(ResolvedUser {
                        user,
                        outcome: ResolveOutcome::Created,
                    });
                }
                Err(StoreError::Conflict(UniqueField::Username)) => {
                    debug!(username = %new_user.username, "username taken on insert");
                    suffix += 1;
                }
                Err(StoreError::Conflict(UniqueField::Email)) => match &email {
                    Some(email) => return self.email_owner(email).await,
                    None => new_user.email = self.placeholder_email(),
                },
                Err(e) => return Err(e.into()),
            }
        }

        Err(IdentityError::UsernamesExhausted(base))
    }

    /// The user that took `email` between our lookup and insert.
    async fn email_owner(&self, email: &str) -> Result<ResolvedUser, IdentityError> {
        let user = self
            .store
            .find_user_by_email(email)
            .await?
            .ok_or(StoreError::Conflict(UniqueField::Email))?;

        warn!(user_id = user.id, "email claimed concurrently, reusing owner");
        Ok(ResolvedUser {
            user,
            outcome: ResolveOutcome::ReusedEmailOwner,
        })
    }

    async fn ensure_link(
        &self,
        user: &User,
        subject: &str,
        info: &UserInfo,
    ) -> Result<(), IdentityError> {
        let existing = self
            .store
            .find_external_account(user.id, PROVIDER_NAME, subject)
            .await?;

        if existing.is_none() {
            self.store
                .create_external_account(&self.link_for(user, subject, info))
                .await?;
            info!(user_id = user.id, "linked external account");
        }

        Ok(())
    }

    fn link_for(&self, user: &User, subject: &str, info: &UserInfo) -> NewExternalAccount {
        NewExternalAccount {
            user_id: user.id,
            provider_name: PROVIDER_NAME.to_string(),
            provider_uid: subject.to_string(),
            name: info.name.clone(),
            image: info.picture.clone(),
        }
    }

    fn display_name(&self, info: &UserInfo) -> String {
        info.name
            .clone()
            .or_else(|| info.given_name.clone())
            .unwrap_or_else(|| self.default_display_name.clone())
    }

    fn placeholder_email(&self) -> String {
        format!(
            "temp_{}@{}",
            hex::encode(rand::random::<[u8; 8]>()),
            self.placeholder_email_domain
        )
    }
}

/// Starting point for username generation.
///
/// Prefers the desired username, then the email local part reduced to
/// lower-case ASCII alphanumerics, then a random `user_xxxxxxxx`.
pub fn base_username(desired: Option<&str>, email: Option<&str>) -> String {
    if let Some(desired) = desired.map(str::trim).filter(|d| !d.is_empty()) {
        return desired.to_string();
    }

    let from_email: String = email
        .and_then(|e| e.split('@').next())
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if !from_email.is_empty() {
        return from_email;
    }

    format!("user_{}", hex::encode(rand::random::<[u8; 4]>()))
}

fn username_candidate(base: &str, suffix: u32) -> String {
    if suffix == 0 {
        base.to_string()
    } else {
        format!("{base}{suffix}")
    }
}
