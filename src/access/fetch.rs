//! Subscription fetch contract and its implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::billing::{EvaluatedSubscriptionState, SubscriptionRecord, SubscriptionStore};

/// Failure fetching a subscription record. Always recovered by failing closed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Unexpected response status {0}")]
    Status(u16),

    #[error("Malformed response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// Loads the subscription record for a user.
///
/// `Ok(None)` means the user has no record.
#[async_trait]
pub trait SubscriptionFetcher: Send + Sync + 'static {
    async fn fetch(&self, user_id: &str) -> Result<Option<SubscriptionRecord>, FetchError>;
}

#[async_trait]
impl<F: SubscriptionFetcher + ?Sized> SubscriptionFetcher for Arc<F> {
    async fn fetch(&self, user_id: &str) -> Result<Option<SubscriptionRecord>, FetchError> {
        (**self).fetch(user_id).await
    }
}

/// Fetcher that reads a [`SubscriptionStore`] directly (server side).
pub struct StoreFetcher<S: SubscriptionStore> {
    store: S,
}

impl<S: SubscriptionStore> StoreFetcher<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: SubscriptionStore + 'static> SubscriptionFetcher for StoreFetcher<S> {
    async fn fetch(&self, user_id: &str) -> Result<Option<SubscriptionRecord>, FetchError> {
        self.store
            .get_subscription(user_id)
            .await
            .map_err(|e| FetchError::Storage(e.to_string()))
    }
}

/// Body of `GET /api/subscription`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionResponse {
    pub subscription: Option<SubscriptionRecord>,
    pub state: EvaluatedSubscriptionState,
}

/// Fetcher that calls the castway HTTP API (client side).
#[derive(Clone)]
pub struct HttpSubscriptionFetcher {
    client: reqwest::Client,
    base_url: String,
    identity_header: String,
}

impl HttpSubscriptionFetcher {
    /// `base_url` is the server origin, e.g. `https://studio.example.com`.
    pub fn new(base_url: impl Into<String>, identity_header: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, identity_header)
    }

    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        identity_header: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            identity_header: identity_header.into(),
        }
    }

    fn url(&self) -> String {
        format!("{}/api/subscription", self.base_url)
    }
}

#[async_trait]
impl SubscriptionFetcher for HttpSubscriptionFetcher {
    async fn fetch(&self, user_id: &str) -> Result<Option<SubscriptionRecord>, FetchError> {
        let response = self
            .client
            .get(self.url())
            .header(self.identity_header.as_str(), user_id)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let body: SubscriptionResponse = response.json().await?;
        Ok(body.subscription)
    }
}
