//! `POST /api/cron/publish-posts`, called by an external scheduler.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, header},
    routing::post,
};
use chrono::Utc;
use subtle::ConstantTimeEq;

use super::response::JsonResponse;
use super::routes::RouteModule;
use crate::app::AppContext;
use crate::error::CastwayError;
use crate::scheduling::{PublishReport, publish_due};

pub struct CronModule;

impl RouteModule for CronModule {
    fn routes(&self, _ctx: &AppContext) -> Router<AppContext> {
        Router::new().route("/cron/publish-posts", post(publish_posts))
    }

    fn prefix(&self) -> Option<&str> {
        Some("/api")
    }
}

async fn publish_posts(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
) -> JsonResponse<PublishReport> {
    let Some(secret) = ctx.config.scheduler.cron_secret.as_deref() else {
        return Err(CastwayError::service_unavailable("Cron endpoint not configured"));
    };

    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default();

    if !secrets_match(presented, secret) {
        tracing::warn!("Rejected cron request with invalid secret");
        return Err(CastwayError::unauthorized("Invalid cron secret"));
    }

    let report = publish_due(
        ctx.posts()?.as_ref(),
        ctx.publisher()?.as_ref(),
        Utc::now(),
    )
    .await?;
    Ok(Json(report))
}

fn secrets_match(presented: &str, expected: &str) -> bool {
    // Slice ct_eq is false for unequal lengths.
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}
