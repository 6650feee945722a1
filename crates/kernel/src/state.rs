//! Application state shared across all handlers.

use std::sync::Arc;

use crate::config::Config;
use crate::services::{IdentityResolver, ReportMaterializer, TopicFieldsExtension};
use crate::store::{ForumStore, SettingsStore, TopicStore, UserStore};

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,

    /// Backend used for health checks and logging.
    forum: Arc<dyn ForumStore>,

    users: Arc<dyn UserStore>,
    topics: Arc<dyn TopicStore>,
    settings: Arc<dyn SettingsStore>,

    identity: IdentityResolver,
    reports: ReportMaterializer,
    topic_fields: TopicFieldsExtension,
}

impl AppState {
    /// Build state over a forum store.
    pub fn new<S: ForumStore + 'static>(config: Config, store: Arc<S>) -> Self {
        let users: Arc<dyn UserStore> = store.clone();
        let topics: Arc<dyn TopicStore> = store.clone();
        let settings: Arc<dyn SettingsStore> = store.clone();

        let identity = IdentityResolver::new(
            users.clone(),
            config.placeholder_email_domain.clone(),
            config.default_display_name.clone(),
        );
        let reports = ReportMaterializer::new(topics.clone());
        let topic_fields = TopicFieldsExtension::new(topics.clone());

        tracing::info!(backend = store.backend(), "forum store ready");

        Self {
            inner: Arc::new(AppStateInner {
                config,
                forum: store,
                users,
                topics,
                settings,
                identity,
                reports,
                topic_fields,
            }),
        }
    }

    /// Get the startup configuration.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn users(&self) -> &Arc<dyn UserStore> {
        &self.inner.users
    }

    pub fn topics(&self) -> &Arc<dyn TopicStore> {
        &self.inner.topics
    }

    pub fn settings(&self) -> &Arc<dyn SettingsStore> {
        &self.inner.settings
    }

    pub fn identity(&self) -> &IdentityResolver {
        &self.inner.identity
    }

    pub fn reports(&self) -> &ReportMaterializer {
        &self.inner.reports
    }

    pub fn topic_fields(&self) -> &TopicFieldsExtension {
        &self.inner.topic_fields
    }

    /// Check if the store backend is reachable.
    pub async fn store_healthy(&self) -> bool {
        self.inner.forum.healthy().await
    }

    /// Short name of the store backend.
    pub fn store_backend(&self) -> &'static str {
        self.inner.forum.backend()
    }
}
