//! Plan badge shown next to the account menu and on upgrade prompts.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::evaluator::EvaluatedSubscriptionState;
use super::storage::{SubscriptionTier, trial_days_left};

/// What the plan badge should display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubscriptionBadge {
    /// Subscription state not loaded yet.
    Loading,
    /// Paid plan.
    Pro,
    /// Trial with whole days remaining (0 on the last day).
    Trial { days_left: u32 },
    /// No access; show the upgrade call to action.
    Free,
}

impl SubscriptionBadge {
    /// Build the badge from the synchronization layer's current value.
    #[must_use]
    pub fn from_state(state: Option<&EvaluatedSubscriptionState>, now: DateTime<Utc>) -> Self {
        match state {
            None => Self::Loading,
            Some(s) if s.is_trialing => Self::Trial {
                days_left: trial_days_left(s.trial_end, now).unwrap_or(0),
            },
            Some(s) if s.is_active && s.tier == SubscriptionTier::Pro => Self::Pro,
            // Active on the free tier is still shown as free.
            Some(_) => Self::Free,
        }
    }

    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Loading => String::new(),
            Self::Pro => "Pro".to_string(),
            Self::Trial { days_left: 0 } => "Trial ends today".to_string(),
            Self::Trial { days_left: 1 } => "Trial: 1 day left".to_string(),
            Self::Trial { days_left } => format!("Trial: {} days left", days_left),
            Self::Free => "Free".to_string(),
        }
    }

    /// Whether to show the upgrade call to action.
    #[must_use]
    pub fn show_upgrade(&self) -> bool {
        matches!(self, Self::Trial { .. } | Self::Free)
    }
}
