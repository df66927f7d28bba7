//! Testing utilities for castway applications.
//!
//! [`Scenario`] drives a router in-process with `tower::ServiceExt::oneshot`;
//! the in-memory stores and fakes live next to their traits
//! (`billing::InMemorySubscriptionStore`, `scheduling::InMemoryPostStore`,
//! `access::RecordingNavigator`) behind the `test-support` feature.

mod scenario;

pub use scenario::{DEFAULT_IDENTITY_HEADER, Scenario, ScenarioAssert, get, post};
