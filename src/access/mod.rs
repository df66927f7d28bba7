//! Subscription-gated access control.
//!
//! Flow: the identity provider publishes an [`IdentityState`], the
//! [`SubscriptionSync`] fetches and evaluates the user's subscription, and
//! the [`AccessGuard`] turns both plus the current path into a
//! [`GuardDecision`], redirecting to the billing page (and optionally showing
//! a notification) when the subscription does not grant access.
//!
//! # Example
//!
//! ```rust,ignore
//! use castway::access::{
//!     AccessGuard, GuardConfig, HttpSubscriptionFetcher, SubscriptionSync, spawn_guard,
//! };
//! use std::sync::Arc;
//!
//! let sync = Arc::new(SubscriptionSync::new(
//!     HttpSubscriptionFetcher::new("https://studio.example.com", "x-user-id"),
//! ));
//! sync.follow(identity_rx.clone());
//!
//! let guard = AccessGuard::new(GuardConfig::new("/settings"), router_navigator)
//!     .with_notifications(notifications.clone());
//! let handle = spawn_guard(guard, identity_rx, sync.subscribe(), path_rx);
//! ```

pub mod fetch;
pub mod guard;
pub mod identity;
pub mod navigation;
pub mod sync;

pub use fetch::{
    FetchError, HttpSubscriptionFetcher, StoreFetcher, SubscriptionFetcher, SubscriptionResponse,
};
pub use guard::{AccessGuard, GuardConfig, GuardDecision, GuardHandle, decide, spawn_guard};
pub use identity::{Identity, IdentityState};
pub use navigation::{NavigationError, Navigator};
pub use sync::{SubscriptionSync, SyncState};

#[cfg(any(test, feature = "test-support"))]
pub use navigation::test::RecordingNavigator;
