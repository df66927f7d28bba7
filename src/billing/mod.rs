//! Subscription records and access evaluation.
//!
//! The payment provider's webhooks keep a per-user [`SubscriptionRecord`]
//! up to date. Everything in the crate that gates features goes through
//! [`evaluate`], which fails closed when no record is available.
//!
//! # Example
//!
//! ```rust
//! use castway::billing::{evaluate, SubscriptionRecord, SubscriptionStatus, SubscriptionTier};
//!
//! let record = SubscriptionRecord::new(SubscriptionStatus::Trialing, SubscriptionTier::Pro);
//! assert!(evaluate(Some(&record)).has_access());
//! assert!(!evaluate(None).has_access());
//! ```

pub mod badge;
pub mod evaluator;
pub mod storage;

pub use badge::SubscriptionBadge;
pub use evaluator::{EvaluatedSubscriptionState, evaluate};
pub use storage::{SubscriptionRecord, SubscriptionStatus, SubscriptionStore, SubscriptionTier};

#[cfg(any(test, feature = "test-support"))]
pub use storage::test::InMemorySubscriptionStore;
