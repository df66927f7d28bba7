//! Client-side subscription synchronization.
//!
//! [`SubscriptionSync`] owns the only cached copy of the evaluated
//! subscription for the signed-in user and republishes it on a `watch`
//! channel. Guards, badges and upgrade prompts only read it.
//!
//! Each identity change starts a new generation. The in-flight fetch of the
//! previous generation is aborted, and a result that still arrives for an old
//! generation is dropped, so a slow fetch for user A can never overwrite the
//! state loaded for user B.

use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::fetch::SubscriptionFetcher;
use super::identity::{Identity, IdentityState};
use crate::billing::{EvaluatedSubscriptionState, evaluate};

/// Published synchronization state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SyncState {
    /// User this state was loaded for. `None` while signed out or while the
    /// identity itself is still resolving.
    pub user_id: Option<String>,
    pub subscription: Option<EvaluatedSubscriptionState>,
    pub is_loading: bool,
}

impl SyncState {
    fn loading() -> Self {
        Self {
            user_id: None,
            subscription: None,
            is_loading: true,
        }
    }

    fn fetching(user_id: &str) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            subscription: None,
            is_loading: true,
        }
    }

    fn resolved(user_id: &str, state: EvaluatedSubscriptionState) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            subscription: Some(state),
            is_loading: false,
        }
    }

    /// Whether this state belongs to `identity`.
    ///
    /// Readers that get identity from another channel must not apply a
    /// state owned by someone else.
    pub fn is_for(&self, identity: Option<&Identity>) -> bool {
        self.user_id.as_deref() == identity.map(|i| i.user_id.as_str())
    }
}

pub struct SubscriptionSync {
    fetcher: Arc<dyn SubscriptionFetcher>,
    shared: Arc<Shared>,
}

struct Shared {
    state_tx: watch::Sender<SyncState>,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    generation: u64,
    identity: IdentityState,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionSync {
    /// Create a synchronization layer with no identity yet.
    pub fn new(fetcher: impl SubscriptionFetcher) -> Self {
        Self::with_fetcher(Arc::new(fetcher))
    }

    pub fn with_fetcher(fetcher: Arc<dyn SubscriptionFetcher>) -> Self {
        let (state_tx, _) = watch::channel(SyncState::default());
        Self {
            fetcher,
            shared: Arc::new(Shared {
                state_tx,
                inner: Mutex::new(Inner::default()),
            }),
        }
    }

    /// Current published state.
    pub fn state(&self) -> SyncState {
        self.shared.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.shared.state_tx.subscribe()
    }

    /// Apply a new identity from the identity provider.
    ///
    /// Re-applying the same identity is a no-op; use [`refresh`](Self::refresh)
    /// to refetch. Must be called within a tokio runtime.
    pub fn set_identity(&self, identity: IdentityState) {
        let mut inner = self.shared.lock();
        if inner.identity == identity {
            return;
        }
        inner.identity = identity;
        self.restart(&mut inner);
    }

    /// Refetch the subscription for the current identity.
    pub fn refresh(&self) {
        let mut inner = self.shared.lock();
        if inner.identity.identity.is_some() {
            self.restart(&mut inner);
        }
    }

    /// Follow an identity provider's channel until it closes.
    pub fn follow(self: &Arc<Self>, mut identity_rx: watch::Receiver<IdentityState>) -> JoinHandle<()> {
        let sync = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let identity = identity_rx.borrow_and_update().clone();
                sync.set_identity(identity);
                if identity_rx.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    fn restart(&self, inner: &mut Inner) {
        inner.generation += 1;
        if let Some(task) = inner.task.take() {
            task.abort();
        }

        match inner.identity.identity.clone() {
            Some(identity) => {
                self.shared
                    .state_tx
                    .send_replace(SyncState::fetching(&identity.user_id));
                inner.task = Some(self.spawn_fetch(identity, inner.generation));
            }
            None if inner.identity.is_loading => {
                self.shared.state_tx.send_replace(SyncState::loading());
            }
            None => {
                self.shared.state_tx.send_replace(SyncState::default());
            }
        }
    }

    fn spawn_fetch(&self, identity: Identity, generation: u64) -> JoinHandle<()> {
        let fetcher = Arc::clone(&self.fetcher);
        let shared = Arc::clone(&self.shared);

        tokio::spawn(async move {
            let state = match fetcher.fetch(&identity.user_id).await {
                Ok(record) => evaluate(record.as_ref()),
                Err(e) => {
                    tracing::warn!(
                        user_id = %identity.user_id,
                        error = %e,
                        "Subscription fetch failed, treating as inactive"
                    );
                    EvaluatedSubscriptionState::fail_closed()
                }
            };

            if !shared.publish_if_current(generation, SyncState::resolved(&identity.user_id, state)) {
                tracing::debug!(
                    user_id = %identity.user_id,
                    generation,
                    "Discarding subscription fetched for a previous identity"
                );
            }
        })
    }
}

impl Shared {
    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish_if_current(&self, generation: u64, state: SyncState) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        inner.task = None;
        self.state_tx.send_replace(state);
        true
    }
}

impl Drop for SubscriptionSync {
    fn drop(&mut self) {
        let mut inner = self.shared.lock();
        inner.generation += 1;
        if let Some(task) = inner.task.take() {
            task.abort();
        }
    }
}
