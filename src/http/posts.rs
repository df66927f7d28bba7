//! Scheduled post routes. Subscription-gated.

use axum::{
    Json, Router,
    extract::State,
    middleware::from_fn_with_state,
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::gate::require_subscription;
use super::identity::CurrentIdentity;
use super::response::{CreatedResponse, JsonResponse};
use super::routes::RouteModule;
use crate::app::AppContext;
use crate::error::Result;
use crate::scheduling::ScheduledPost;

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub text: String,
    pub scheduled_for: DateTime<Utc>,
}

/// `GET /api/posts` and `POST /api/posts`
pub struct PostsModule;

impl RouteModule for PostsModule {
    fn routes(&self, ctx: &AppContext) -> Router<AppContext> {
        Router::new()
            .route("/posts", get(list_posts).post(create_post))
            .route_layer(from_fn_with_state(ctx.clone(), require_subscription))
    }

    fn prefix(&self) -> Option<&str> {
        Some("/api")
    }
}

async fn list_posts(
    State(ctx): State<AppContext>,
    CurrentIdentity(identity): CurrentIdentity,
) -> JsonResponse<Vec<ScheduledPost>> {
    let posts = ctx.posts()?.list_for_user(&identity.user_id).await?;
    Ok(Json(posts))
}

async fn create_post(
    State(ctx): State<AppContext>,
    CurrentIdentity(identity): CurrentIdentity,
    Json(request): Json<CreatePostRequest>,
) -> Result<CreatedResponse<ScheduledPost>> {
    let post = ScheduledPost::new(
        identity.user_id,
        &request.text,
        request.scheduled_for,
        Utc::now(),
    )?;
    ctx.posts()?.insert(&post).await?;

    tracing::info!(
        post_id = %post.id,
        user_id = %post.user_id,
        scheduled_for = %post.scheduled_for,
        "Post scheduled"
    );

    let location = format!("/api/posts/{}", post.id);
    Ok(CreatedResponse::new(post, location))
}
