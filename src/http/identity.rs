//! Request identity.
//!
//! Authentication happens upstream: the gateway verifies the session and
//! forwards the user id in a trusted header (`x-user-id` unless configured
//! otherwise). [`identity_layer`] lifts that header into an [`Identity`]
//! request extension.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use std::future::Future;

use crate::access::Identity;
use crate::app::AppContext;
use crate::error::CastwayError;

/// Middleware that attaches the caller's [`Identity`] when the identity
/// header is present and non-empty.
///
/// ```rust,ignore
/// let router = Router::new()
///     .route("/api/subscription", get(handler))
///     .layer(axum::middleware::from_fn_with_state(ctx.clone(), identity_layer));
/// ```
pub async fn identity_layer(
    State(ctx): State<AppContext>,
    mut request: Request,
    next: Next,
) -> Response {
    let header = ctx.config.access.identity_header.as_str();
    let user_id = request
        .headers()
        .get(header)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    if let Some(user_id) = user_id {
        request.extensions_mut().insert(Identity::new(user_id));
    }

    next.run(request).await
}

/// Extractor for the signed-in user. Rejects with 401 when no identity was
/// attached by [`identity_layer`].
///
/// ```rust,ignore
/// async fn handler(CurrentIdentity(identity): CurrentIdentity) -> String {
///     identity.user_id
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Identity);

impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = CastwayError;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let identity = parts.extensions.get::<Identity>().cloned();
        async move {
            identity
                .map(CurrentIdentity)
                .ok_or_else(|| CastwayError::unauthorized("Sign in required"))
        }
    }
}
