//! Scheduled social posts for podcast promotion.
//!
//! Posts are validated and stored as pending, then a [`PostScheduler`] (or
//! the cron endpoint) runs [`publish_due`] to hand due posts to a
//! [`PostPublisher`].

pub mod post;
pub mod publisher;
pub mod scheduler;
pub mod store;

pub use post::{MAX_POST_CHARS, PostStatus, ScheduledPost};
pub use publisher::PostPublisher;
pub use scheduler::{PostScheduler, PublishReport, SchedulerHandle, publish_due};
pub use store::PostStore;

#[cfg(any(test, feature = "test-support"))]
pub use publisher::test::RecordingPublisher;
#[cfg(any(test, feature = "test-support"))]
pub use store::test::InMemoryPostStore;
