//! Session context: who is signed in.
//!
//! The identity provider publishes every auth-state transition into a
//! [`SessionContext`]; the client only reads it. Anyone interested in
//! transitions can [`subscribe`](SessionContext::subscribe).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

/// The authenticated identity behind a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Stable user id, used as the key of the user's namespace.
    pub uid: String,
    /// The account's email address, if the provider supplies one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Principal {
    /// Create a principal.
    #[must_use]
    pub fn new(uid: impl Into<String>, email: Option<String>) -> Self {
        Self {
            uid: uid.into(),
            email,
        }
    }
}

/// Tracks the current principal of one session.
///
/// Cloning yields another handle onto the same session. Independent
/// sessions are independent values.
#[derive(Debug, Clone)]
pub struct SessionContext {
    state: Arc<watch::Sender<Option<Principal>>>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    /// Create a signed-out session.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            state: Arc::new(state),
        }
    }

    /// Create a session already signed in as `principal`.
    #[must_use]
    pub fn signed_in(principal: Principal) -> Self {
        let (state, _) = watch::channel(Some(principal));
        Self {
            state: Arc::new(state),
        }
    }

    /// Record an auth-state transition reported by the identity provider.
    pub fn publish(&self, principal: Option<Principal>) {
        match &principal {
            Some(p) => info!(
                "Auth state changed: {}",
                p.email.as_deref().unwrap_or(p.uid.as_str())
            ),
            None => info!("Auth state changed: signed out"),
        }
        self.state.send_replace(principal);
    }

    /// The currently signed-in principal, if any.
    #[must_use]
    pub fn current_principal(&self) -> Option<Principal> {
        self.state.borrow().clone()
    }

    /// Check if a principal is signed in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_some()
    }

    /// Observe auth-state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Principal>> {
        self.state.subscribe()
    }
}
