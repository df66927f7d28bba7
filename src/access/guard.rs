//! Subscription access guard.
//!
//! One parameterized guard replaces the separate plain / toast / redirect
//! variants: [`GuardConfig`] decides whether a redirect also shows a
//! notification.
//!
//! Decisions are recomputed on every input change. A change of identity,
//! subscription state, loading flag or path opens a new decision epoch; within
//! one epoch the guard navigates and notifies at most once, however often it
//! is re-evaluated.

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::identity::{Identity, IdentityState};
use super::navigation::Navigator;
use super::sync::SyncState;
use crate::billing::EvaluatedSubscriptionState;
use crate::config::AccessConfig;
use crate::notify::{NotificationCenter, Severity};

/// What the gated page should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Identity or subscription still resolving; render a loading view.
    Loading,
    /// Render the protected content.
    Allow,
    /// Navigate to the target and render a loading view meanwhile.
    Redirect(String),
}

/// Decide access for one set of inputs.
///
/// Returns `None` when nobody is signed in: unauthenticated users are the
/// authentication gate's concern, not this guard's.
#[must_use]
pub fn decide(
    identity: Option<&Identity>,
    subscription: Option<&EvaluatedSubscriptionState>,
    is_loading: bool,
    current_path: &str,
    billing_path: &str,
) -> Option<GuardDecision> {
    if is_loading {
        return Some(GuardDecision::Loading);
    }
    if identity.is_none() {
        return None;
    }

    let Some(subscription) = subscription else {
        // Signed in but the first fetch has not started yet.
        return Some(GuardDecision::Loading);
    };

    if subscription.has_access() || same_path(current_path, billing_path) {
        Some(GuardDecision::Allow)
    } else {
        Some(GuardDecision::Redirect(billing_path.to_string()))
    }
}

fn normalize(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

fn same_path(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

/// Guard settings.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    pub billing_path: String,
    pub notify_on_redirect: bool,
    pub redirect_message: String,
    pub redirect_severity: Severity,
    pub notification_duration: Duration,
}

impl GuardConfig {
    pub fn new(billing_path: impl Into<String>) -> Self {
        Self::from(&AccessConfig::default()).with_billing_path(billing_path)
    }

    pub fn with_billing_path(mut self, path: impl Into<String>) -> Self {
        self.billing_path = path.into();
        self
    }

    pub fn with_notification(mut self, enabled: bool) -> Self {
        self.notify_on_redirect = enabled;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.redirect_message = message.into();
        self
    }
}

impl From<&AccessConfig> for GuardConfig {
    fn from(config: &AccessConfig) -> Self {
        Self {
            billing_path: config.billing_path.clone(),
            notify_on_redirect: config.notify_on_redirect,
            redirect_message: config.redirect_message.clone(),
            redirect_severity: config.redirect_severity,
            notification_duration: config.notification_duration(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct EpochKey {
    identity: Option<Identity>,
    subscription: Option<EvaluatedSubscriptionState>,
    is_loading: bool,
    path: String,
}

/// Stateful guard that performs the redirect side effects.
pub struct AccessGuard<N: Navigator> {
    config: GuardConfig,
    navigator: N,
    notifications: Option<NotificationCenter>,
    epoch: Option<EpochKey>,
    redirected: bool,
}

impl<N: Navigator> AccessGuard<N> {
    pub fn new(config: GuardConfig, navigator: N) -> Self {
        Self {
            config,
            navigator,
            notifications: None,
            epoch: None,
            redirected: false,
        }
    }

    /// Attach the notification center redirects report to.
    pub fn with_notifications(mut self, notifications: NotificationCenter) -> Self {
        self.notifications = Some(notifications);
        self
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Re-evaluate after any input changed.
    pub fn evaluate(
        &mut self,
        identity: &IdentityState,
        sync: &SyncState,
        current_path: &str,
    ) -> Option<GuardDecision> {
        // Identity and subscription arrive on separate channels; a state
        // loaded for another user counts as still loading.
        let owned = identity.identity.is_none() || sync.is_for(identity.identity.as_ref());
        let subscription = if owned { sync.subscription } else { None };
        let is_loading = identity.is_loading || sync.is_loading || !owned;
        let key = EpochKey {
            identity: identity.identity.clone(),
            subscription,
            is_loading,
            path: normalize(current_path).to_string(),
        };
        if self.epoch.as_ref() != Some(&key) {
            self.epoch = Some(key);
            self.redirected = false;
        }

        let decision = decide(
            identity.identity.as_ref(),
            subscription.as_ref(),
            is_loading,
            current_path,
            &self.config.billing_path,
        );

        if let Some(GuardDecision::Redirect(target)) = &decision {
            if !self.redirected {
                self.redirected = true;
                self.redirect(target, identity.identity.as_ref());
            }
        }

        decision
    }

    fn redirect(&self, target: &str, identity: Option<&Identity>) {
        let user_id = identity.map(|i| i.user_id.as_str()).unwrap_or_default();
        tracing::info!(user_id = %user_id, target = %target, "Redirecting user without an active subscription");

        if self.config.notify_on_redirect {
            if let Some(notifications) = &self.notifications {
                notifications.notify(
                    self.config.redirect_message.clone(),
                    self.config.redirect_severity,
                    self.config.notification_duration,
                );
            }
        }

        // Not retried: the loading view stays up as the failure indicator.
        if let Err(e) = self.navigator.go_to(target) {
            tracing::warn!(user_id = %user_id, error = %e, "Redirect navigation failed");
        }
    }
}

/// Running guard driven by channel updates.
pub struct GuardHandle {
    decisions: watch::Receiver<Option<GuardDecision>>,
    task: JoinHandle<()>,
}

impl GuardHandle {
    pub fn decision(&self) -> Option<GuardDecision> {
        self.decisions.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<GuardDecision>> {
        self.decisions.clone()
    }
}

impl Drop for GuardHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Run a guard that re-evaluates whenever identity, subscription state or
/// the current path changes, and never from anywhere else.
///
/// A closed identity or path channel keeps its last value. The guard stops
/// once the subscription channel closes.
pub fn spawn_guard<N: Navigator + 'static>(
    mut guard: AccessGuard<N>,
    mut identity_rx: watch::Receiver<IdentityState>,
    mut sync_rx: watch::Receiver<SyncState>,
    mut path_rx: watch::Receiver<String>,
) -> GuardHandle {
    let (decision_tx, decisions) = watch::channel(None);

    let task = tokio::spawn(async move {
        let mut identity_open = true;
        let mut path_open = true;
        loop {
            let identity = identity_rx.borrow_and_update().clone();
            let sync = sync_rx.borrow_and_update().clone();
            let path = path_rx.borrow_and_update().clone();

            let decision = guard.evaluate(&identity, &sync, &path);
            decision_tx.send_if_modified(|current| {
                if *current == decision {
                    false
                } else {
                    *current = decision;
                    true
                }
            });

            tokio::select! {
                r = identity_rx.changed(), if identity_open => identity_open = r.is_ok(),
                r = sync_rx.changed() => {
                    if r.is_err() {
                        break;
                    }
                }
                r = path_rx.changed(), if path_open => path_open = r.is_ok(),
            }
        }
    });

    GuardHandle { decisions, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::navigation::test::RecordingNavigator;
    use crate::billing::{SubscriptionRecord, SubscriptionStatus, SubscriptionTier, evaluate};
    use chrono::{Duration as ChronoDuration, Utc};

    fn state(status: SubscriptionStatus) -> EvaluatedSubscriptionState {
        evaluate(Some(&SubscriptionRecord::new(status, SubscriptionTier::Pro)))
    }

    fn synced(status: SubscriptionStatus) -> SyncState {
        synced_for("alice", status)
    }

    fn synced_for(user_id: &str, status: SubscriptionStatus) -> SyncState {
        SyncState {
            user_id: Some(user_id.to_string()),
            subscription: Some(state(status)),
            is_loading: false,
        }
    }

    async fn wait_for(rx: &watch::Receiver<Option<GuardDecision>>, expected: Option<GuardDecision>) {
        let mut rx = rx.clone();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|d| *d == expected))
            .await
            .expect("decision not reached")
            .unwrap();
    }

    fn guard() -> (AccessGuard<RecordingNavigator>, RecordingNavigator, NotificationCenter) {
        let navigator = RecordingNavigator::new();
        let notifications = NotificationCenter::new();
        let guard = AccessGuard::new(GuardConfig::new("/settings"), navigator.clone())
            .with_notifications(notifications.clone());
        (guard, navigator, notifications)
    }

    #[test]
    fn test_decide_without_identity_defers() {
        let active = state(SubscriptionStatus::Active);
        assert_eq!(decide(None, Some(&active), false, "/dashboard", "/settings"), None);
        assert_eq!(decide(None, None, false, "/dashboard", "/settings"), None);
    }

    #[test]
    fn test_decide_loading() {
        let alice = Identity::new("alice");
        assert_eq!(
            decide(None, None, true, "/dashboard", "/settings"),
            Some(GuardDecision::Loading)
        );
        assert_eq!(
            decide(Some(&alice), None, true, "/dashboard", "/settings"),
            Some(GuardDecision::Loading)
        );
        assert_eq!(
            decide(Some(&alice), None, false, "/dashboard", "/settings"),
            Some(GuardDecision::Loading)
        );
    }

    #[test]
    fn test_decide_trialing_with_future_end_allows() {
        let alice = Identity::new("alice");
        let trial = evaluate(Some(
            &SubscriptionRecord::new(SubscriptionStatus::Trialing, SubscriptionTier::Pro)
                .with_trial_end(Utc::now() + ChronoDuration::days(10)),
        ));
        assert_eq!(
            decide(Some(&alice), Some(&trial), false, "/dashboard", "/settings"),
            Some(GuardDecision::Allow)
        );
    }

    #[test]
    fn test_decide_gated_statuses_redirect() {
        let alice = Identity::new("alice");
        for status in [
            SubscriptionStatus::PastDue,
            SubscriptionStatus::Canceled,
            SubscriptionStatus::Unpaid,
            SubscriptionStatus::Incomplete,
            SubscriptionStatus::IncompleteExpired,
            SubscriptionStatus::Free,
        ] {
            assert_eq!(
                decide(Some(&alice), Some(&state(status)), false, "/dashboard", "/settings"),
                Some(GuardDecision::Redirect("/settings".to_string())),
                "status {status}"
            );
        }
    }

    #[test]
    fn test_decide_on_billing_path_allows() {
        let alice = Identity::new("alice");
        let canceled = state(SubscriptionStatus::Canceled);
        assert_eq!(
            decide(Some(&alice), Some(&canceled), false, "/settings", "/settings"),
            Some(GuardDecision::Allow)
        );
        assert_eq!(
            decide(Some(&alice), Some(&canceled), false, "/settings/", "/settings"),
            Some(GuardDecision::Allow)
        );
    }

    #[tokio::test]
    async fn test_canceled_redirects_once_with_one_notification() {
        let (mut guard, navigator, notifications) = guard();
        let identity = IdentityState::signed_in("alice");
        let sync = synced(SubscriptionStatus::Canceled);

        for _ in 0..5 {
            assert_eq!(
                guard.evaluate(&identity, &sync, "/dashboard"),
                Some(GuardDecision::Redirect("/settings".to_string()))
            );
        }

        assert_eq!(navigator.calls(), vec!["/settings".to_string()]);
        assert_eq!(notifications.active().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_behaves_like_canceled() {
        let (mut guard, navigator, notifications) = guard();
        let identity = IdentityState::signed_in("alice");
        let failed = SyncState {
            user_id: Some("alice".to_string()),
            subscription: Some(EvaluatedSubscriptionState::fail_closed()),
            is_loading: false,
        };

        assert_eq!(
            guard.evaluate(&identity, &failed, "/dashboard"),
            Some(GuardDecision::Redirect("/settings".to_string()))
        );
        guard.evaluate(&identity, &failed, "/dashboard");

        assert_eq!(navigator.calls().len(), 1);
        assert_eq!(notifications.active().len(), 1);
    }

    #[tokio::test]
    async fn test_arriving_at_billing_path_allows() {
        let (mut guard, navigator, _) = guard();
        let identity = IdentityState::signed_in("alice");
        let sync = synced(SubscriptionStatus::Canceled);

        guard.evaluate(&identity, &sync, "/dashboard");
        assert_eq!(
            guard.evaluate(&identity, &sync, "/settings"),
            Some(GuardDecision::Allow)
        );
        assert_eq!(navigator.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_new_epoch_redirects_again() {
        let (mut guard, navigator, notifications) = guard();
        let identity = IdentityState::signed_in("alice");
        let sync = synced(SubscriptionStatus::Canceled);

        guard.evaluate(&identity, &sync, "/dashboard");
        guard.evaluate(&identity, &sync, "/settings");
        guard.evaluate(&identity, &sync, "/episodes");

        assert_eq!(navigator.calls().len(), 2);
        assert_eq!(notifications.active().len(), 2);
    }

    #[tokio::test]
    async fn test_navigation_failure_is_not_retried() {
        let (mut guard, navigator, _) = guard();
        navigator.fail_all();
        let identity = IdentityState::signed_in("alice");
        let sync = synced(SubscriptionStatus::Unpaid);

        for _ in 0..3 {
            assert_eq!(
                guard.evaluate(&identity, &sync, "/dashboard"),
                Some(GuardDecision::Redirect("/settings".to_string()))
            );
        }
        assert_eq!(navigator.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_notification_can_be_disabled() {
        let navigator = RecordingNavigator::new();
        let notifications = NotificationCenter::new();
        let mut guard = AccessGuard::new(
            GuardConfig::new("/settings").with_notification(false),
            navigator.clone(),
        )
        .with_notifications(notifications.clone());

        guard.evaluate(
            &IdentityState::signed_in("alice"),
            &synced(SubscriptionStatus::Canceled),
            "/dashboard",
        );

        assert_eq!(navigator.calls().len(), 1);
        assert!(notifications.active().is_empty());
    }

    #[tokio::test]
    async fn test_signed_out_never_navigates() {
        let (mut guard, navigator, _) = guard();
        let decision = guard.evaluate(&IdentityState::signed_out(), &SyncState::default(), "/dashboard");
        assert_eq!(decision, None);
        assert!(navigator.calls().is_empty());
    }

    #[tokio::test]
    async fn test_spawned_guard_follows_channels() {
        let (guard, navigator, _) = guard();
        let (identity_tx, identity_rx) = watch::channel(IdentityState::loading());
        let (sync_tx, sync_rx) = watch::channel(SyncState::default());
        let (path_tx, path_rx) = watch::channel("/dashboard".to_string());

        let handle = spawn_guard(guard, identity_rx, sync_rx, path_rx);
        let decisions = handle.subscribe();

        wait_for(&decisions, Some(GuardDecision::Loading)).await;

        identity_tx.send_replace(IdentityState::signed_in("alice"));
        sync_tx.send_replace(synced(SubscriptionStatus::Canceled));
        wait_for(&decisions, Some(GuardDecision::Redirect("/settings".to_string()))).await;

        path_tx.send_replace("/settings".to_string());
        wait_for(&decisions, Some(GuardDecision::Allow)).await;

        assert_eq!(navigator.calls(), vec!["/settings".to_string()]);
        assert_eq!(handle.decision(), Some(GuardDecision::Allow));
    }

    #[tokio::test]
    async fn test_state_for_previous_user_is_not_applied() {
        let (mut guard, navigator, notifications) = guard();
        let alice_canceled = synced(SubscriptionStatus::Canceled);

        assert_eq!(
            guard.evaluate(&IdentityState::signed_in("alice"), &alice_canceled, "/dashboard"),
            Some(GuardDecision::Redirect("/settings".to_string()))
        );

        // bob signs in before his own fetch has been started or resolved
        let bob = IdentityState::signed_in("bob");
        for _ in 0..3 {
            assert_eq!(
                guard.evaluate(&bob, &alice_canceled, "/dashboard"),
                Some(GuardDecision::Loading)
            );
        }
        let bob_fetching = SyncState {
            user_id: Some("bob".to_string()),
            subscription: None,
            is_loading: true,
        };
        assert_eq!(
            guard.evaluate(&bob, &bob_fetching, "/dashboard"),
            Some(GuardDecision::Loading)
        );
        assert_eq!(
            guard.evaluate(&bob, &synced_for("bob", SubscriptionStatus::Active), "/dashboard"),
            Some(GuardDecision::Allow)
        );

        assert_eq!(navigator.calls().len(), 1);
        assert_eq!(notifications.active().len(), 1);
    }

    #[tokio::test]
    async fn test_spawned_guard_waits_for_new_users_state() {
        let (guard, navigator, _) = guard();
        let (identity_tx, identity_rx) = watch::channel(IdentityState::signed_in("alice"));
        let (sync_tx, sync_rx) = watch::channel(synced(SubscriptionStatus::Canceled));
        let (_path_tx, path_rx) = watch::channel("/dashboard".to_string());

        let handle = spawn_guard(guard, identity_rx, sync_rx, path_rx);
        let decisions = handle.subscribe();
        wait_for(&decisions, Some(GuardDecision::Redirect("/settings".to_string()))).await;

        identity_tx.send_replace(IdentityState::signed_in("bob"));
        wait_for(&decisions, Some(GuardDecision::Loading)).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(handle.decision(), Some(GuardDecision::Loading));

        sync_tx.send_replace(synced_for("bob", SubscriptionStatus::Active));
        wait_for(&decisions, Some(GuardDecision::Allow)).await;

        assert_eq!(navigator.calls(), vec!["/settings".to_string()]);
    }

    #[tokio::test]
    async fn test_spawned_guard_survives_closed_identity_channel() {
        let (guard, navigator, _) = guard();
        let (identity_tx, identity_rx) = watch::channel(IdentityState::signed_in("alice"));
        let (sync_tx, sync_rx) = watch::channel(SyncState {
            user_id: Some("alice".to_string()),
            subscription: None,
            is_loading: true,
        });
        let (path_tx, path_rx) = watch::channel("/dashboard".to_string());

        let handle = spawn_guard(guard, identity_rx, sync_rx, path_rx);
        let decisions = handle.subscribe();
        wait_for(&decisions, Some(GuardDecision::Loading)).await;

        drop(identity_tx);
        drop(path_tx);
        tokio::task::yield_now().await;

        sync_tx.send_replace(synced(SubscriptionStatus::Active));
        wait_for(&decisions, Some(GuardDecision::Allow)).await;
        assert!(navigator.calls().is_empty());
    }

    #[tokio::test]
    async fn test_custom_redirect_message() {
        let navigator = RecordingNavigator::new();
        let notifications = NotificationCenter::new();
        let mut guard = AccessGuard::new(
            GuardConfig::new("/billing").with_message("Upgrade to keep publishing."),
            navigator.clone(),
        )
        .with_notifications(notifications.clone());

        guard.evaluate(
            &IdentityState::signed_in("alice"),
            &synced(SubscriptionStatus::PastDue),
            "/studio",
        );

        assert_eq!(navigator.calls(), vec!["/billing".to_string()]);
        let active = notifications.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].message, "Upgrade to keep publishing.");
    }
}
