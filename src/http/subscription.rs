//! `GET /api/subscription`

use axum::{Json, Router, extract::State, routing::get};

use super::identity::CurrentIdentity;
use super::response::JsonResponse;
use super::routes::RouteModule;
use crate::access::SubscriptionResponse;
use crate::app::AppContext;
use crate::billing::evaluate;

/// Serves the caller's subscription record and its evaluation.
///
/// This is what [`HttpSubscriptionFetcher`](crate::access::HttpSubscriptionFetcher)
/// calls. A store failure is returned as an error status, which clients
/// treat as "no access".
pub struct SubscriptionModule;

impl RouteModule for SubscriptionModule {
    fn routes(&self, _ctx: &AppContext) -> Router<AppContext> {
        Router::new().route("/subscription", get(get_subscription))
    }

    fn prefix(&self) -> Option<&str> {
        Some("/api")
    }
}

async fn get_subscription(
    State(ctx): State<AppContext>,
    CurrentIdentity(identity): CurrentIdentity,
) -> JsonResponse<SubscriptionResponse> {
    let record = ctx
        .subscriptions()?
        .get_subscription(&identity.user_id)
        .await?;

    let state = evaluate(record.as_ref());
    tracing::debug!(
        user_id = %identity.user_id,
        has_access = state.has_access(),
        "Subscription state served"
    );

    Ok(Json(SubscriptionResponse {
        subscription: record,
        state,
    }))
}
