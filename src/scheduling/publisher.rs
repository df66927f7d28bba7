//! Outbound publication of scheduled posts.

use async_trait::async_trait;

use super::post::ScheduledPost;
use crate::error::Result;

/// Publishes a post to the user's connected social account.
#[async_trait]
pub trait PostPublisher: Send + Sync {
    /// Publish and return the platform's identifier for the new post.
    async fn publish(&self, post: &ScheduledPost) -> Result<String>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod test {
    use super::*;
    use crate::error::CastwayError;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    /// Publisher that records what it was asked to publish.
    ///
    /// Posts whose text was registered with [`RecordingPublisher::fail_text`]
    /// are rejected.
    #[derive(Default, Clone)]
    pub struct RecordingPublisher {
        published: Arc<Mutex<Vec<ScheduledPost>>>,
        failing: Arc<Mutex<HashSet<String>>>,
    }

    impl RecordingPublisher {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_text(&self, text: impl Into<String>) {
            self.failing.lock().unwrap().insert(text.into());
        }

        pub fn published(&self) -> Vec<ScheduledPost> {
            self.published.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PostPublisher for RecordingPublisher {
        async fn publish(&self, post: &ScheduledPost) -> Result<String> {
            if self.failing.lock().unwrap().contains(&post.text) {
                return Err(CastwayError::service_unavailable("platform rejected the post"));
            }
            self.published.lock().unwrap().push(post.clone());
            Ok(format!("ext_{}", post.id))
        }
    }
}
