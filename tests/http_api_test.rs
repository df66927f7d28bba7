//! The HTTP API served on a real socket, consumed by the HTTP fetcher.

use castway::access::{
    FetchError, HttpSubscriptionFetcher, IdentityState, SubscriptionFetcher, SubscriptionSync,
};
use castway::billing::{
    InMemorySubscriptionStore, SubscriptionRecord, SubscriptionStatus, SubscriptionTier,
};
use castway::scheduling::{InMemoryPostStore, RecordingPublisher};
use castway::{App, AppContext, ConfigBuilder};
use chrono::{Duration, Utc};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

struct TestServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    async fn start(store: InMemorySubscriptionStore, posts: InMemoryPostStore) -> Self {
        let config = ConfigBuilder::new().with_cron_secret("s3cret").build().unwrap();
        let context = AppContext::builder()
            .with_subscriptions(Arc::new(store))
            .with_posts(Arc::new(posts))
            .with_publisher(Arc::new(RecordingPublisher::new()))
            .build();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(
            App::with_config(config)
                .with_context(context)
                .serve_with_shutdown(listener, async move {
                    let _ = rx.await;
                }),
        );

        Self {
            addr,
            shutdown: Some(tx),
            task,
        }
    }

    fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.task.await.unwrap().unwrap();
    }
}

fn seeded_store() -> InMemorySubscriptionStore {
    let store = InMemorySubscriptionStore::new();
    store.insert(
        "pro",
        SubscriptionRecord::new(SubscriptionStatus::Active, SubscriptionTier::Pro),
    );
    store.insert(
        "lapsed",
        SubscriptionRecord::new(SubscriptionStatus::PastDue, SubscriptionTier::Pro),
    );
    store
}

#[tokio::test]
async fn http_fetcher_reads_subscription_endpoint() {
    let server = TestServer::start(seeded_store(), InMemoryPostStore::new()).await;
    let fetcher = HttpSubscriptionFetcher::new(server.url(), "x-user-id");

    let record = fetcher.fetch("pro").await.unwrap().unwrap();
    assert_eq!(record.status, SubscriptionStatus::Active);
    assert!(fetcher.fetch("nobody").await.unwrap().is_none());

    server.stop().await;
}

#[tokio::test]
async fn http_fetcher_error_status_fails_closed() {
    let store = seeded_store();
    let server = TestServer::start(store.clone(), InMemoryPostStore::new()).await;
    let fetcher = HttpSubscriptionFetcher::new(server.url(), "x-user-id");

    store.fail_next_reads(1);
    assert_eq!(fetcher.fetch("pro").await, Err(FetchError::Status(503)));

    store.fail_next_reads(1);
    let sync = SubscriptionSync::new(fetcher);
    let mut rx = sync.subscribe();
    sync.set_identity(IdentityState::signed_in("pro"));
    let state = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        rx.wait_for(|s| s.subscription.is_some()),
    )
    .await
    .expect("timed out waiting for sync")
    .unwrap()
    .clone();

    let subscription = state.subscription.unwrap();
    assert!(!subscription.has_access());
    assert!(subscription.is_expired);

    server.stop().await;
}

#[tokio::test]
async fn gated_route_returns_402_with_redirect() {
    let server = TestServer::start(seeded_store(), InMemoryPostStore::new()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/posts", server.url()))
        .header("x-user-id", "lapsed")
        .json(&json!({ "text": "hi", "scheduled_for": Utc::now() + Duration::hours(1) }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::PAYMENT_REQUIRED);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["redirect_to"], "/settings");
    assert!(body["error_id"].is_string());

    let response = client
        .post(format!("{}/api/posts", server.url()))
        .header("x-user-id", "pro")
        .json(&json!({ "text": "hi", "scheduled_for": Utc::now() + Duration::hours(1) }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);
    assert!(response.headers().contains_key("location"));

    server.stop().await;
}

#[tokio::test]
async fn cron_endpoint_requires_secret() {
    let server = TestServer::start(seeded_store(), InMemoryPostStore::new()).await;
    let client = reqwest::Client::new();
    let url = format!("{}/api/cron/publish-posts", server.url());

    let denied = client.post(&url).bearer_auth("nope").send().await.unwrap();
    assert_eq!(denied.status(), reqwest::StatusCode::UNAUTHORIZED);

    let report: serde_json::Value = client
        .post(&url)
        .bearer_auth("s3cret")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(report["due"], 0);

    server.stop().await;
}
