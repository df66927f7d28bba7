//! Storage traits for subscription records.
//!
//! The subscription table is owned by the payment webhook pipeline; this
//! crate only reads the fields it needs to gate access. Implement
//! [`SubscriptionStore`] over your database.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trait for reading and writing per-user subscription records.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Get the subscription record for a user, if one exists.
    async fn get_subscription(&self, user_id: &str) -> Result<Option<SubscriptionRecord>>;

    /// Save/update the subscription record for a user.
    async fn save_subscription(&self, user_id: &str, record: &SubscriptionRecord) -> Result<()>;

    /// Delete the subscription record for a user.
    async fn delete_subscription(&self, user_id: &str) -> Result<()>;
}

/// Persisted subscription state for a single user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubscriptionRecord {
    /// Subscription status.
    pub status: SubscriptionStatus,
    /// Plan tier.
    #[serde(default)]
    pub tier: SubscriptionTier,
    /// When the trial ends (if in trial).
    #[serde(default)]
    pub trial_end: Option<DateTime<Utc>>,
    /// When the current billing period ends.
    #[serde(default)]
    pub current_period_end: Option<DateTime<Utc>>,
}

impl SubscriptionRecord {
    /// Create a record with the given status and no dates.
    #[must_use]
    pub fn new(status: SubscriptionStatus, tier: SubscriptionTier) -> Self {
        Self {
            status,
            tier,
            trial_end: None,
            current_period_end: None,
        }
    }

    /// A free-tier record, as written for users who never subscribed.
    #[must_use]
    pub fn free() -> Self {
        Self::new(SubscriptionStatus::Free, SubscriptionTier::Free)
    }

    #[must_use]
    pub fn with_trial_end(mut self, trial_end: DateTime<Utc>) -> Self {
        self.trial_end = Some(trial_end);
        self
    }

    #[must_use]
    pub fn with_current_period_end(mut self, period_end: DateTime<Utc>) -> Self {
        self.current_period_end = Some(period_end);
        self
    }

    /// Whole days left in the trial, or `None` when not trialing or the
    /// trial end has passed.
    #[must_use]
    pub fn trial_days_remaining(&self, now: DateTime<Utc>) -> Option<u32> {
        if self.status != SubscriptionStatus::Trialing {
            return None;
        }
        trial_days_left(self.trial_end, now)
    }
}

pub(crate) fn trial_days_left(trial_end: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<u32> {
    trial_end.and_then(|end| {
        if end > now {
            u32::try_from((end - now).num_days()).ok()
        } else {
            None
        }
    })
}

/// Subscription status as written by the payment provider webhooks.
///
/// Deserialization never fails: unknown strings become [`SubscriptionStatus::Free`]
/// and are logged at warn level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SubscriptionStatus {
    /// Subscription is active and paid.
    Active,
    /// Subscription is in trial period.
    Trialing,
    /// Payment failed, provider is retrying.
    PastDue,
    /// Subscription has been canceled.
    Canceled,
    /// Subscription is unpaid after retries were exhausted.
    Unpaid,
    /// Awaiting first payment.
    Incomplete,
    /// First payment never completed.
    IncompleteExpired,
    /// No paid subscription.
    Free,
}

impl SubscriptionStatus {
    /// Parse a stored status string.
    #[must_use]
    pub fn parse(status: &str) -> Self {
        match status {
            "active" => Self::Active,
            "trialing" => Self::Trialing,
            "past_due" => Self::PastDue,
            "canceled" => Self::Canceled,
            "unpaid" => Self::Unpaid,
            "incomplete" => Self::Incomplete,
            "incomplete_expired" => Self::IncompleteExpired,
            "free" => Self::Free,
            other => {
                tracing::warn!(
                    target: "castway::billing",
                    status = %other,
                    "Unrecognized subscription status, treating as free"
                );
                Self::Free
            }
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Trialing => "trialing",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
            Self::Unpaid => "unpaid",
            Self::Incomplete => "incomplete",
            Self::IncompleteExpired => "incomplete_expired",
            Self::Free => "free",
        }
    }
}

impl From<String> for SubscriptionStatus {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<SubscriptionStatus> for String {
    fn from(value: SubscriptionStatus) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Plan tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Pro,
}

impl SubscriptionTier {
    #[must_use]
    pub fn parse(tier: &str) -> Self {
        match tier {
            "free" => Self::Free,
            "pro" => Self::Pro,
            other => {
                tracing::warn!(
                    target: "castway::billing",
                    tier = %other,
                    "Unrecognized subscription tier, treating as free"
                );
                Self::Free
            }
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
        }
    }
}

impl From<String> for SubscriptionTier {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<SubscriptionTier> for String {
    fn from(value: SubscriptionTier) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// In-memory subscription store for testing.
#[cfg(any(test, feature = "test-support"))]
pub mod test {
    use super::*;
    use crate::error::CastwayError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, RwLock};

    /// In-memory subscription store.
    ///
    /// Wraps data in Arc for cheap cloning. `fail_next_reads` makes the next
    /// N reads return an error so callers can exercise fetch failures.
    #[derive(Default, Clone)]
    pub struct InMemorySubscriptionStore {
        inner: Arc<Inner>,
    }

    #[derive(Default)]
    struct Inner {
        subscriptions: RwLock<HashMap<String, SubscriptionRecord>>,
        failing_reads: AtomicUsize,
        reads: AtomicUsize,
    }

    impl InMemorySubscriptionStore {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed a record without going through the async trait.
        pub fn insert(&self, user_id: impl Into<String>, record: SubscriptionRecord) {
            self.inner
                .subscriptions
                .write()
                .unwrap()
                .insert(user_id.into(), record);
        }

        /// Make the next `count` reads fail.
        pub fn fail_next_reads(&self, count: usize) {
            self.inner.failing_reads.store(count, Ordering::SeqCst);
        }

        /// Number of `get_subscription` calls served so far.
        pub fn read_count(&self) -> usize {
            self.inner.reads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SubscriptionStore for InMemorySubscriptionStore {
        async fn get_subscription(&self, user_id: &str) -> Result<Option<SubscriptionRecord>> {
            self.inner.reads.fetch_add(1, Ordering::SeqCst);

            let failing = self
                .inner
                .failing_reads
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(CastwayError::service_unavailable("subscription store offline"));
            }

            Ok(self.inner.subscriptions.read().unwrap().get(user_id).cloned())
        }

        async fn save_subscription(&self, user_id: &str, record: &SubscriptionRecord) -> Result<()> {
            self.insert(user_id, record.clone());
            Ok(())
        }

        async fn delete_subscription(&self, user_id: &str) -> Result<()> {
            self.inner.subscriptions.write().unwrap().remove(user_id);
            Ok(())
        }
    }
}
