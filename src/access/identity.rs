//! Identity as seen by the subscription layers.
//!
//! Session handling lives upstream; this module only describes what the
//! identity provider hands over.

use serde::{Deserialize, Serialize};

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

/// Sign-in state published by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct IdentityState {
    pub identity: Option<Identity>,
    /// Session is still being resolved.
    pub is_loading: bool,
}

impl IdentityState {
    pub fn loading() -> Self {
        Self {
            identity: None,
            is_loading: true,
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self {
            identity: Some(Identity::new(user_id)),
            is_loading: false,
        }
    }
}
