use std::sync::Arc;

use crate::billing::SubscriptionStore;
use crate::config::Config;
use crate::error::{CastwayError, Result};
use crate::scheduling::{PostPublisher, PostStore};

/// Application context shared by every handler.
///
/// Stores are trait objects so deployments can plug in their own backends;
/// a missing store surfaces as a 500 from the handler that needs it.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,

    pub subscriptions: Option<Arc<dyn SubscriptionStore>>,

    pub posts: Option<Arc<dyn PostStore>>,

    /// Social platform client used to publish scheduled posts
    pub publisher: Option<Arc<dyn PostPublisher>>,
}

impl AppContext {
    pub fn new() -> Self {
        Self {
            config: Arc::new(Config::default()),
            subscriptions: None,
            posts: None,
            publisher: None,
        }
    }

    pub fn builder() -> AppContextBuilder {
        AppContextBuilder::new()
    }

    /// Get the subscription store, returning an error if not configured
    pub fn subscriptions(&self) -> Result<&Arc<dyn SubscriptionStore>> {
        self.subscriptions
            .as_ref()
            .ok_or_else(|| CastwayError::internal("Subscription store not configured"))
    }

    /// Get the post store, returning an error if not configured
    pub fn posts(&self) -> Result<&Arc<dyn PostStore>> {
        self.posts
            .as_ref()
            .ok_or_else(|| CastwayError::internal("Post store not configured"))
    }

    /// Get the post publisher, returning an error if not configured
    pub fn publisher(&self) -> Result<&Arc<dyn PostPublisher>> {
        self.publisher
            .as_ref()
            .ok_or_else(|| CastwayError::internal("Post publisher not configured"))
    }
}

impl Default for AppContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for AppContext with fluent API
#[must_use = "builder does nothing until you call build()"]
pub struct AppContextBuilder {
    config: Option<Config>,
    subscriptions: Option<Arc<dyn SubscriptionStore>>,
    posts: Option<Arc<dyn PostStore>>,
    publisher: Option<Arc<dyn PostPublisher>>,
}

impl AppContextBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            subscriptions: None,
            posts: None,
            publisher: None,
        }
    }

    /// Set the configuration handlers read (identity header, billing path,
    /// cron secret). `App` overrides this with its own config.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_subscriptions(mut self, store: Arc<dyn SubscriptionStore>) -> Self {
        self.subscriptions = Some(store);
        self
    }

    pub fn with_posts(mut self, store: Arc<dyn PostStore>) -> Self {
        self.posts = Some(store);
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn PostPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn build(self) -> AppContext {
        AppContext {
            config: Arc::new(self.config.unwrap_or_default()),
            subscriptions: self.subscriptions,
            posts: self.posts,
            publisher: self.publisher,
        }
    }
}

impl Default for AppContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
