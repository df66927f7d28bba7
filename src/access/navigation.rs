//! Navigation contract used for redirects.

/// Navigation failed; the caller keeps showing its loading view.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Navigation to {path} failed: {reason}")]
pub struct NavigationError {
    pub path: String,
    pub reason: String,
}

/// Moves the user to another page.
///
/// Called at most once per guard decision epoch and never retried.
pub trait Navigator: Send + Sync {
    fn go_to(&self, path: &str) -> Result<(), NavigationError>;
}

impl<N: Navigator + ?Sized> Navigator for std::sync::Arc<N> {
    fn go_to(&self, path: &str) -> Result<(), NavigationError> {
        (**self).go_to(path)
    }
}

/// Navigator that records calls, for tests.
#[cfg(any(test, feature = "test-support"))]
pub mod test {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    pub struct RecordingNavigator {
        calls: Arc<Mutex<Vec<String>>>,
        failing: Arc<AtomicBool>,
    }

    impl RecordingNavigator {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every subsequent `go_to` fail (the call is still recorded).
        pub fn fail_all(&self) {
            self.failing.store(true, Ordering::SeqCst);
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Navigator for RecordingNavigator {
        fn go_to(&self, path: &str) -> Result<(), NavigationError> {
            self.calls.lock().unwrap().push(path.to_string());
            if self.failing.load(Ordering::SeqCst) {
                return Err(NavigationError {
                    path: path.to_string(),
                    reason: "navigation rejected".to_string(),
                });
            }
            Ok(())
        }
    }
}
