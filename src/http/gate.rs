//! Server-side subscription gate.

use axum::{
    extract::{OriginalUri, Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::access::{GuardDecision, Identity, decide};
use crate::app::AppContext;
use crate::billing::{EvaluatedSubscriptionState, evaluate};
use crate::error::CastwayError;

/// Middleware that lets a request through only when the caller's
/// subscription grants access.
///
/// Requests without an identity pass through untouched; rejecting them is
/// the authentication gate's job. Store failures, including a missing
/// store, fail closed. A rejected
/// JSON client gets `402 Payment Required` with `redirect_to`; anything else
/// is sent to the billing page with `303 See Other`.
///
/// Must be layered inside [`identity_layer`](super::identity_layer).
pub async fn require_subscription(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Response {
    let Some(identity) = request.extensions().get::<Identity>().cloned() else {
        return next.run(request).await;
    };

    let state = load_state(&ctx, &identity).await;

    // Nested routers see a stripped path; decide on the one the client sent.
    let path = request
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.path().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let billing_path = ctx.config.access.billing_path.as_str();
    match decide(Some(&identity), Some(&state), false, &path, billing_path) {
        Some(GuardDecision::Redirect(target)) => {
            tracing::info!(
                user_id = %identity.user_id,
                path = %path,
                target = %target,
                "Subscription required"
            );
            if wants_json(request.headers(), &path) {
                CastwayError::payment_required("An active subscription is required")
                    .into_response_with_redirect(Some(target), ctx.config.server.dev_mode)
            } else {
                Redirect::to(&target).into_response()
            }
        }
        _ => next.run(request).await,
    }
}

async fn load_state(ctx: &AppContext, identity: &Identity) -> EvaluatedSubscriptionState {
    let store = match ctx.subscriptions() {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(user_id = %identity.user_id, error = %e, "No subscription store, denying access");
            return EvaluatedSubscriptionState::fail_closed();
        }
    };
    match store.get_subscription(&identity.user_id).await {
        Ok(record) => evaluate(record.as_ref()),
        Err(e) => {
            tracing::warn!(user_id = %identity.user_id, error = %e, "Subscription lookup failed, denying access");
            EvaluatedSubscriptionState::fail_closed()
        }
    }
}

fn wants_json(headers: &HeaderMap, path: &str) -> bool {
    let accepts_json = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"));
    accepts_json || path.starts_with("/api/")
}
