//! Due-post publication and its polling loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::publisher::PostPublisher;
use super::store::PostStore;
use crate::error::Result;

/// Outcome of one publication pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReport {
    pub due: usize,
    pub published: usize,
    pub failed: usize,
}

/// Publish every post due at `now`.
///
/// Each post is attempted once. A publisher error marks that post failed
/// and the pass moves on; only a failure to list due posts aborts the pass.
pub async fn publish_due(
    store: &dyn PostStore,
    publisher: &dyn PostPublisher,
    now: DateTime<Utc>,
) -> Result<PublishReport> {
    let due = store.list_due(now).await?;
    let mut report = PublishReport {
        due: due.len(),
        ..PublishReport::default()
    };

    for post in &due {
        match publisher.publish(post).await {
            Ok(external_id) => {
                if let Err(e) = store.mark_posted(&post.id, &external_id, Utc::now()).await {
                    tracing::error!(post_id = %post.id, error = %e, "Published post could not be marked posted");
                    report.failed += 1;
                    continue;
                }
                tracing::info!(
                    post_id = %post.id,
                    user_id = %post.user_id,
                    external_id = %external_id,
                    "Scheduled post published"
                );
                report.published += 1;
            }
            Err(e) => {
                tracing::warn!(post_id = %post.id, user_id = %post.user_id, error = %e, "Scheduled post failed");
                if let Err(mark_err) = store.mark_failed(&post.id, &e.to_string()).await {
                    tracing::error!(post_id = %post.id, error = %mark_err, "Failed post could not be marked failed");
                }
                report.failed += 1;
            }
        }
    }

    if report.due > 0 {
        tracing::info!(
            due = report.due,
            published = report.published,
            failed = report.failed,
            "Publication pass finished"
        );
    }
    Ok(report)
}

/// Background loop running [`publish_due`] on a fixed interval.
pub struct PostScheduler {
    store: Arc<dyn PostStore>,
    publisher: Arc<dyn PostPublisher>,
    interval: Duration,
}

impl PostScheduler {
    pub fn new(
        store: Arc<dyn PostStore>,
        publisher: Arc<dyn PostPublisher>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            publisher,
            interval,
        }
    }

    /// Run until a shutdown signal arrives (or every sender is dropped).
    ///
    /// The first pass runs immediately.
    pub async fn start(self, mut shutdown_rx: mpsc::Receiver<()>) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Post scheduler started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Shutdown signal received, stopping post scheduler");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = publish_due(self.store.as_ref(), self.publisher.as_ref(), Utc::now()).await {
                        tracing::error!(error = %e, "Publication pass failed");
                    }
                }
            }
        }

        tracing::info!("Post scheduler stopped");
    }

    /// Spawn the loop onto the runtime.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(self.start(shutdown_rx));
        SchedulerHandle { shutdown_tx, task }
    }
}

/// Handle to a spawned [`PostScheduler`].
pub struct SchedulerHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the loop, letting an in-flight pass finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.task.await;
    }
}
