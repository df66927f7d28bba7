use async_trait::async_trait;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::app::AppContext;

/// Health check status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Health check result for a single component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentHealth {
    fn new(name: &str, status: HealthStatus, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: Some(message.into()),
        }
    }
}

/// Overall health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub checks: Vec<ComponentHealth>,
}

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        let status_code = match self.status {
            HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        };

        (status_code, Json(self)).into_response()
    }
}

#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check(&self, ctx: &AppContext) -> ComponentHealth;
}

/// The subscription store is required: without it every gated route fails
/// closed.
struct SubscriptionStoreCheck;

#[async_trait]
impl HealthCheck for SubscriptionStoreCheck {
    async fn check(&self, ctx: &AppContext) -> ComponentHealth {
        match ctx.subscriptions {
            Some(_) => ComponentHealth::new("subscriptions", HealthStatus::Healthy, "configured"),
            None => ComponentHealth::new(
                "subscriptions",
                HealthStatus::Unhealthy,
                "subscription store not configured",
            ),
        }
    }
}

/// Post scheduling is optional; missing pieces only degrade the service.
struct SchedulingCheck;

#[async_trait]
impl HealthCheck for SchedulingCheck {
    async fn check(&self, ctx: &AppContext) -> ComponentHealth {
        match (&ctx.posts, &ctx.publisher) {
            (Some(_), Some(_)) => {
                ComponentHealth::new("scheduling", HealthStatus::Healthy, "configured")
            }
            (None, _) => ComponentHealth::new(
                "scheduling",
                HealthStatus::Degraded,
                "post store not configured",
            ),
            (Some(_), None) => ComponentHealth::new(
                "scheduling",
                HealthStatus::Degraded,
                "post publisher not configured",
            ),
        }
    }
}

/// Runs the built-in checks and folds the worst status into the result.
pub struct HealthChecker {
    checks: Vec<Arc<dyn HealthCheck>>,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self {
            checks: vec![Arc::new(SubscriptionStoreCheck), Arc::new(SchedulingCheck)],
        }
    }

    pub async fn check_health(&self, ctx: &AppContext) -> HealthResponse {
        let mut checks = Vec::with_capacity(self.checks.len());
        let mut overall_status = HealthStatus::Healthy;

        for check in &self.checks {
            let result = check.check(ctx).await;

            match result.status {
                HealthStatus::Unhealthy => overall_status = HealthStatus::Unhealthy,
                HealthStatus::Degraded if overall_status == HealthStatus::Healthy => {
                    overall_status = HealthStatus::Degraded
                }
                _ => {}
            }

            checks.push(result);
        }

        HealthResponse {
            status: overall_status,
            checks,
        }
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}

/// Handler for `GET /health`
pub async fn health_handler(State(ctx): State<AppContext>) -> HealthResponse {
    HealthChecker::new().check_health(&ctx).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::InMemorySubscriptionStore;
    use crate::scheduling::{InMemoryPostStore, RecordingPublisher};

    #[tokio::test]
    async fn test_fully_configured_is_healthy() {
        let ctx = AppContext::builder()
            .with_subscriptions(Arc::new(InMemorySubscriptionStore::new()))
            .with_posts(Arc::new(InMemoryPostStore::new()))
            .with_publisher(Arc::new(RecordingPublisher::new()))
            .build();

        let health = HealthChecker::new().check_health(&ctx).await;
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.checks.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_scheduling_is_degraded() {
        let ctx = AppContext::builder()
            .with_subscriptions(Arc::new(InMemorySubscriptionStore::new()))
            .build();

        let health = HealthChecker::new().check_health(&ctx).await;
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.into_response().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_subscription_store_is_unhealthy() {
        let health = HealthChecker::new().check_health(&AppContext::new()).await;
        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert_eq!(health.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
