//! Subscription state evaluation.
//!
//! Maps a raw [`SubscriptionRecord`] to the handful of flags the guard,
//! badge and HTTP gate read. Missing records fail closed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::storage::{SubscriptionRecord, SubscriptionStatus, SubscriptionTier};

/// Derived view of a subscription record. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvaluatedSubscriptionState {
    /// Status is `active`.
    pub is_active: bool,
    /// Status is `trialing`.
    pub is_trialing: bool,
    /// Neither active nor trialing.
    pub is_expired: bool,
    pub tier: SubscriptionTier,
    pub trial_end: Option<DateTime<Utc>>,
}

impl EvaluatedSubscriptionState {
    /// State used when no record could be read: no access.
    #[must_use]
    pub const fn fail_closed() -> Self {
        Self {
            is_active: false,
            is_trialing: false,
            is_expired: true,
            tier: SubscriptionTier::Free,
            trial_end: None,
        }
    }

    /// Whether gated features may be used.
    #[must_use]
    pub fn has_access(&self) -> bool {
        self.is_active || self.is_trialing
    }
}

impl Default for EvaluatedSubscriptionState {
    fn default() -> Self {
        Self::fail_closed()
    }
}

/// Evaluate a subscription record.
///
/// `past_due`, `unpaid` and the incomplete states are gated along with
/// `canceled` and `free`; only `active` and `trialing` grant access.
#[must_use]
pub fn evaluate(record: Option<&SubscriptionRecord>) -> EvaluatedSubscriptionState {
    let Some(record) = record else {
        return EvaluatedSubscriptionState::fail_closed();
    };

    let is_active = record.status == SubscriptionStatus::Active;
    let is_trialing = record.status == SubscriptionStatus::Trialing;

    EvaluatedSubscriptionState {
        is_active,
        is_trialing,
        is_expired: !(is_active || is_trialing),
        tier: record.tier,
        trial_end: if is_trialing { record.trial_end } else { None },
    }
}
