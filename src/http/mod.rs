//! HTTP surface: identity, the subscription gate and the API routes.

pub mod cron;
pub mod gate;
pub mod identity;
pub mod posts;
pub mod response;
pub mod routes;
pub mod subscription;

pub use cron::CronModule;
pub use gate::require_subscription;
pub use identity::{CurrentIdentity, identity_layer};
pub use posts::{CreatePostRequest, PostsModule};
pub use response::{CreatedResponse, JsonResponse};
pub use routes::RouteModule;
pub use subscription::SubscriptionModule;
