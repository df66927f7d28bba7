//! Identity provider → subscription sync → guard, wired the way a client
//! shell wires them.

use async_trait::async_trait;
use castway::access::{
    AccessGuard, FetchError, GuardConfig, GuardDecision, IdentityState, RecordingNavigator,
    StoreFetcher, SubscriptionFetcher, SubscriptionSync, spawn_guard,
};
use castway::billing::{
    InMemorySubscriptionStore, SubscriptionRecord, SubscriptionStatus, SubscriptionTier,
};
use castway::notify::{NotificationCenter, NotificationEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, watch};

/// Store-backed fetcher that holds reads for one user until released.
struct HeldFetcher {
    inner: StoreFetcher<InMemorySubscriptionStore>,
    held_user: String,
    release: Notify,
}

#[async_trait]
impl SubscriptionFetcher for HeldFetcher {
    async fn fetch(&self, user_id: &str) -> Result<Option<SubscriptionRecord>, FetchError> {
        if user_id == self.held_user {
            self.release.notified().await;
        }
        self.inner.fetch(user_id).await
    }
}

async fn wait_for_decision(
    rx: &mut watch::Receiver<Option<GuardDecision>>,
    expected: GuardDecision,
) {
    tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|d| d.as_ref() == Some(&expected)),
    )
    .await
    .expect("timed out waiting for guard decision")
    .expect("guard stopped");
}

#[tokio::test]
async fn lapsed_user_is_redirected_once_with_one_notification() {
    let store = InMemorySubscriptionStore::new();
    store.insert(
        "lapsed",
        SubscriptionRecord::new(SubscriptionStatus::Canceled, SubscriptionTier::Pro),
    );

    let (identity_tx, identity_rx) = watch::channel(IdentityState::loading());
    let (path_tx, path_rx) = watch::channel("/studio".to_string());

    let sync = Arc::new(SubscriptionSync::new(StoreFetcher::new(store.clone())));
    let _follower = sync.follow(identity_rx.clone());

    let navigator = RecordingNavigator::new();
    let notifications = NotificationCenter::new();
    let mut events = notifications.subscribe();
    let guard = AccessGuard::new(GuardConfig::new("/settings"), navigator.clone())
        .with_notifications(notifications.clone());
    let handle = spawn_guard(guard, identity_rx, sync.subscribe(), path_rx);
    let mut decisions = handle.subscribe();

    wait_for_decision(&mut decisions, GuardDecision::Loading).await;

    identity_tx.send(IdentityState::signed_in("lapsed")).unwrap();
    wait_for_decision(&mut decisions, GuardDecision::Redirect("/settings".into())).await;

    // The shell follows the redirect.
    path_tx.send("/settings".to_string()).unwrap();
    wait_for_decision(&mut decisions, GuardDecision::Allow).await;

    assert_eq!(navigator.calls(), vec!["/settings".to_string()]);
    assert!(matches!(events.try_recv(), Ok(NotificationEvent::Shown(_))));
    assert!(events.try_recv().is_err());
    assert_eq!(store.read_count(), 1);
}

#[tokio::test]
async fn trialing_user_sees_content_and_sign_out_clears_state() {
    let store = InMemorySubscriptionStore::new();
    store.insert(
        "trial",
        SubscriptionRecord::new(SubscriptionStatus::Trialing, SubscriptionTier::Pro),
    );

    let (identity_tx, identity_rx) = watch::channel(IdentityState::signed_in("trial"));
    let (_path_tx, path_rx) = watch::channel("/studio".to_string());

    let sync = Arc::new(SubscriptionSync::new(StoreFetcher::new(store)));
    let _follower = sync.follow(identity_rx.clone());

    let navigator = RecordingNavigator::new();
    let guard = AccessGuard::new(GuardConfig::new("/settings"), navigator.clone());
    let handle = spawn_guard(guard, identity_rx, sync.subscribe(), path_rx);
    let mut decisions = handle.subscribe();

    wait_for_decision(&mut decisions, GuardDecision::Allow).await;
    assert!(sync.state().subscription.is_some_and(|s| s.is_trialing));

    identity_tx.send(IdentityState::signed_out()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), decisions.wait_for(Option::is_none))
        .await
        .expect("timed out waiting for signed-out decision")
        .expect("guard stopped");

    let mut sync_rx = sync.subscribe();
    tokio::time::timeout(
        Duration::from_secs(5),
        sync_rx.wait_for(|s| s.subscription.is_none() && !s.is_loading),
    )
    .await
    .expect("timed out waiting for sync to clear")
    .expect("sync dropped");
    assert!(navigator.calls().is_empty());
}

#[tokio::test]
async fn storage_outage_fails_closed() {
    let store = InMemorySubscriptionStore::new();
    store.insert(
        "paying",
        SubscriptionRecord::new(SubscriptionStatus::Active, SubscriptionTier::Pro),
    );
    store.fail_next_reads(1);

    let (_identity_tx, identity_rx) = watch::channel(IdentityState::signed_in("paying"));
    let (_path_tx, path_rx) = watch::channel("/studio".to_string());

    let sync = Arc::new(SubscriptionSync::new(StoreFetcher::new(store)));
    let _follower = sync.follow(identity_rx.clone());

    let navigator = RecordingNavigator::new();
    let guard = AccessGuard::new(
        GuardConfig::new("/settings").with_notification(false),
        navigator.clone(),
    );
    let handle = spawn_guard(guard, identity_rx, sync.subscribe(), path_rx);
    let mut decisions = handle.subscribe();

    wait_for_decision(&mut decisions, GuardDecision::Redirect("/settings".into())).await;

    // A manual refresh after the outage restores access.
    sync.refresh();
    wait_for_decision(&mut decisions, GuardDecision::Allow).await;
    assert_eq!(navigator.calls().len(), 1);
}

#[tokio::test]
async fn switching_user_waits_for_the_new_users_subscription() {
    let store = InMemorySubscriptionStore::new();
    store.insert(
        "lapsed",
        SubscriptionRecord::new(SubscriptionStatus::Canceled, SubscriptionTier::Pro),
    );
    store.insert(
        "paying",
        SubscriptionRecord::new(SubscriptionStatus::Active, SubscriptionTier::Pro),
    );
    let fetcher = Arc::new(HeldFetcher {
        inner: StoreFetcher::new(store),
        held_user: "paying".to_string(),
        release: Notify::new(),
    });

    let (identity_tx, identity_rx) = watch::channel(IdentityState::signed_in("lapsed"));
    let (_path_tx, path_rx) = watch::channel("/studio".to_string());

    let sync = Arc::new(SubscriptionSync::with_fetcher(fetcher.clone()));
    let _follower = sync.follow(identity_rx.clone());

    let navigator = RecordingNavigator::new();
    let guard = AccessGuard::new(GuardConfig::new("/settings"), navigator.clone());
    let handle = spawn_guard(guard, identity_rx, sync.subscribe(), path_rx);
    let mut decisions = handle.subscribe();

    wait_for_decision(&mut decisions, GuardDecision::Redirect("/settings".into())).await;

    // The shell has not followed the redirect yet when another user signs in.
    identity_tx.send(IdentityState::signed_in("paying")).unwrap();
    wait_for_decision(&mut decisions, GuardDecision::Loading).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(handle.decision(), Some(GuardDecision::Loading));

    fetcher.release.notify_one();
    wait_for_decision(&mut decisions, GuardDecision::Allow).await;
    assert_eq!(navigator.calls(), vec!["/settings".to_string()]);
}
