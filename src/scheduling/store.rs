//! Scheduled post storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::post::ScheduledPost;
use crate::error::Result;

/// Storage for scheduled posts.
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn insert(&self, post: &ScheduledPost) -> Result<()>;

    /// All posts for a user, soonest first.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<ScheduledPost>>;

    /// Pending posts whose scheduled time is at or before `now`.
    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledPost>>;

    async fn mark_posted(
        &self,
        post_id: &str,
        external_id: &str,
        posted_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn mark_failed(&self, post_id: &str, error: &str) -> Result<()>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod test {
    use super::*;
    use crate::error::CastwayError;
    use crate::scheduling::post::PostStatus;
    use std::collections::HashMap;
    use std::sync::{Arc, RwLock};

    /// In-memory post store.
    #[derive(Default, Clone)]
    pub struct InMemoryPostStore {
        posts: Arc<RwLock<HashMap<String, ScheduledPost>>>,
    }

    impl InMemoryPostStore {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        pub fn get(&self, post_id: &str) -> Option<ScheduledPost> {
            self.posts.read().unwrap().get(post_id).cloned()
        }

        pub fn len(&self) -> usize {
            self.posts.read().unwrap().len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }

        fn update(&self, post_id: &str, f: impl FnOnce(&mut ScheduledPost)) -> Result<()> {
            let mut posts = self.posts.write().unwrap();
            let post = posts
                .get_mut(post_id)
                .ok_or_else(|| CastwayError::not_found(format!("Post {} not found", post_id)))?;
            f(post);
            Ok(())
        }
    }

    #[async_trait]
    impl PostStore for InMemoryPostStore {
        async fn insert(&self, post: &ScheduledPost) -> Result<()> {
            self.posts
                .write()
                .unwrap()
                .insert(post.id.clone(), post.clone());
            Ok(())
        }

        async fn list_for_user(&self, user_id: &str) -> Result<Vec<ScheduledPost>> {
            let mut posts: Vec<ScheduledPost> = self
                .posts
                .read()
                .unwrap()
                .values()
                .filter(|p| p.user_id == user_id)
                .cloned()
                .collect();
            posts.sort_by_key(|p| p.scheduled_for);
            Ok(posts)
        }

        async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledPost>> {
            let mut due: Vec<ScheduledPost> = self
                .posts
                .read()
                .unwrap()
                .values()
                .filter(|p| p.is_due(now))
                .cloned()
                .collect();
            due.sort_by_key(|p| p.scheduled_for);
            Ok(due)
        }

        async fn mark_posted(
            &self,
            post_id: &str,
            external_id: &str,
            posted_at: DateTime<Utc>,
        ) -> Result<()> {
            self.update(post_id, |post| {
                post.status = PostStatus::Posted;
                post.external_id = Some(external_id.to_string());
                post.posted_at = Some(posted_at);
                post.error = None;
            })
        }

        async fn mark_failed(&self, post_id: &str, error: &str) -> Result<()> {
            self.update(post_id, |post| {
                post.status = PostStatus::Failed;
                post.error = Some(error.to_string());
            })
        }
    }
}
