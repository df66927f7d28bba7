use axum::Router;

use crate::app::AppContext;

/// A group of routes registered on the application as one unit.
///
/// Modules receive the context at registration so they can attach
/// state-aware middleware such as
/// [`require_subscription`](super::require_subscription).
///
/// # Example
///
/// ```rust,ignore
/// struct EpisodesModule;
///
/// impl RouteModule for EpisodesModule {
///     fn routes(&self, ctx: &AppContext) -> Router<AppContext> {
///         Router::new()
///             .route("/episodes", get(list_episodes))
///             .route_layer(from_fn_with_state(ctx.clone(), require_subscription))
///     }
///
///     fn prefix(&self) -> Option<&str> {
///         Some("/api")
///     }
/// }
/// ```
pub trait RouteModule {
    /// Routes for this module, without state applied.
    fn routes(&self, ctx: &AppContext) -> Router<AppContext>;

    /// Optional path prefix for every route in the module
    fn prefix(&self) -> Option<&str> {
        None
    }

    /// Register this module's routes into `router`.
    fn register(&self, router: Router<AppContext>, ctx: &AppContext) -> Router<AppContext> {
        let routes = self.routes(ctx);
        match self.prefix() {
            Some(prefix) => router.nest(prefix, routes),
            None => router.merge(routes),
        }
    }
}
