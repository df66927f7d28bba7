//! Scheduled social posts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CastwayError, Result};

/// Longest post text accepted, in characters.
pub const MAX_POST_CHARS: usize = 280;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Pending,
    Posted,
    Failed,
}

/// A post queued for publication on the user's social account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledPost {
    pub id: String,
    pub user_id: String,
    pub text: String,
    pub scheduled_for: DateTime<Utc>,
    pub status: PostStatus,
    pub created_at: DateTime<Utc>,
    pub posted_at: Option<DateTime<Utc>>,
    /// Identifier assigned by the platform once posted.
    pub external_id: Option<String>,
    pub error: Option<String>,
}

impl ScheduledPost {
    /// Validate and build a pending post.
    ///
    /// Text is trimmed; it must be non-empty and at most [`MAX_POST_CHARS`]
    /// characters, and `scheduled_for` must be after `now`.
    pub fn new(
        user_id: impl Into<String>,
        text: &str,
        scheduled_for: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CastwayError::bad_request("Post text must not be empty"));
        }
        if text.chars().count() > MAX_POST_CHARS {
            return Err(CastwayError::bad_request(format!(
                "Post text must be at most {} characters",
                MAX_POST_CHARS
            )));
        }
        if scheduled_for <= now {
            return Err(CastwayError::bad_request(
                "Scheduled time must be in the future",
            ));
        }

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            text: text.to_string(),
            scheduled_for,
            status: PostStatus::Pending,
            created_at: now,
            posted_at: None,
            external_id: None,
            error: None,
        })
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == PostStatus::Pending && self.scheduled_for <= now
    }
}
