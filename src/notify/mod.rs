//! Transient user notifications (toasts).
//!
//! A [`NotificationCenter`] is created once at the root of the UI tree and
//! cloned into whatever needs to enqueue messages; there is no global
//! instance. Renderers subscribe to [`NotificationEvent`]s.
//!
//! # Example
//!
//! ```rust,no_run
//! use castway::notify::{NotificationCenter, Severity};
//! use std::time::Duration;
//!
//! # async fn run() {
//! let center = NotificationCenter::new();
//! let mut events = center.subscribe();
//!
//! let id = center.notify("Episode uploaded", Severity::Success, Duration::from_secs(4));
//! center.dismiss(&id);
//! center.dismiss(&id); // no-op
//! # }
//! ```

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;

/// Capacity of the event channel; slow renderers see `Lagged` past this.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Unique notification identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(String);

impl NotificationId {
    fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// A notification currently on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: NotificationId,
    pub message: String,
    pub severity: Severity,
    pub duration_ms: u64,
    #[serde(skip)]
    seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DismissReason {
    /// Closed by the user (or by code) before the timer ran out.
    User,
    /// Auto-dismissed after its duration.
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NotificationEvent {
    Shown(Notification),
    Dismissed {
        id: NotificationId,
        reason: DismissReason,
    },
}

/// Enqueue/dismiss handle for transient notifications.
#[derive(Clone)]
pub struct NotificationCenter {
    inner: Arc<Inner>,
}

struct Inner {
    active: DashMap<NotificationId, Notification>,
    events: broadcast::Sender<NotificationEvent>,
    next_seq: AtomicU64,
}

impl NotificationCenter {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                active: DashMap::new(),
                events,
                next_seq: AtomicU64::new(0),
            }),
        }
    }

    /// Enqueue a notification that dismisses itself after `duration`.
    ///
    /// Must be called from within a tokio runtime; the expiry timer is a
    /// spawned task holding only a weak reference to the center.
    pub fn notify(
        &self,
        message: impl Into<String>,
        severity: Severity,
        duration: Duration,
    ) -> NotificationId {
        let notification = Notification {
            id: NotificationId::generate(),
            message: message.into(),
            severity,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            seq: self.inner.next_seq.fetch_add(1, Ordering::Relaxed),
        };
        let id = notification.id.clone();

        tracing::debug!(
            notification_id = %id,
            severity = ?severity,
            duration_ms = notification.duration_ms,
            "Notification enqueued"
        );

        self.inner.active.insert(id.clone(), notification.clone());
        // No receivers is fine: nothing is rendering yet.
        let _ = self.inner.events.send(NotificationEvent::Shown(notification));

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let expiring = id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if let Some(inner) = weak.upgrade() {
                inner.remove(&expiring, DismissReason::Expired);
            }
        });

        id
    }

    /// Dismiss a notification early. Returns `false` if it was already gone.
    pub fn dismiss(&self, id: &NotificationId) -> bool {
        self.inner.remove(id, DismissReason::User)
    }

    /// Notifications currently shown, oldest first.
    pub fn active(&self) -> Vec<Notification> {
        let mut active: Vec<Notification> =
            self.inner.active.iter().map(|e| e.value().clone()).collect();
        active.sort_by_key(|n| n.seq);
        active
    }

    pub fn is_active(&self, id: &NotificationId) -> bool {
        self.inner.active.contains_key(id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.inner.events.subscribe()
    }
}

impl Inner {
    fn remove(&self, id: &NotificationId, reason: DismissReason) -> bool {
        if self.active.remove(id).is_none() {
            return false;
        }
        tracing::debug!(notification_id = %id, reason = ?reason, "Notification dismissed");
        let _ = self.events.send(NotificationEvent::Dismissed {
            id: id.clone(),
            reason,
        });
        true
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}
