//! Auth provider integration.
//!
//! The engine never inspects credentials. A signed-in identity only selects
//! which partitions the engine holds; signing out tears them down.

use crate::store::RemoteSubscription;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tracing::debug;

/// A signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Stable user id.
    pub uid: String,
    /// Email address, if the provider reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Display name, if the provider reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Identity {
    /// Creates an identity with only a user id.
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            display_name: None,
        }
    }

    /// Sets the email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Handler invoked with the current identity, or `None` when signed out.
pub type AuthHandler = Arc<dyn Fn(Option<Identity>) + Send + Sync>;

/// Source of sign-in and sign-out notifications.
pub trait AuthProvider: Send + Sync {
    /// Registers a handler. It is invoked with the current state right away
    /// and again on every change.
    fn on_state_change(&self, handler: AuthHandler) -> Box<dyn RemoteSubscription>;
}

struct AuthShared {
    current: Option<Identity>,
    handlers: Vec<(u64, AuthHandler)>,
    next_id: u64,
}

/// An auth provider driven by explicit sign-in and sign-out calls.
#[derive(Clone)]
pub struct MemoryAuthProvider {
    shared: Arc<Mutex<AuthShared>>,
}

impl MemoryAuthProvider {
    /// Creates a provider with nobody signed in.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(AuthShared {
                current: None,
                handlers: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Signs a user in and notifies handlers.
    pub fn sign_in(&self, identity: Identity) {
        debug!(uid = %identity.uid, "sign in");
        self.set(Some(identity));
    }

    /// Signs the current user out and notifies handlers.
    pub fn sign_out(&self) {
        debug!("sign out");
        self.set(None);
    }

    /// Returns the signed-in identity.
    pub fn current(&self) -> Option<Identity> {
        self.shared.lock().current.clone()
    }

    /// Returns the number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.shared.lock().handlers.len()
    }

    fn set(&self, identity: Option<Identity>) {
        let handlers: Vec<AuthHandler> = {
            let mut shared = self.shared.lock();
            shared.current = identity.clone();
            shared.handlers.iter().map(|(_, h)| Arc::clone(h)).collect()
        };
        for handler in handlers {
            handler(identity.clone());
        }
    }
}

impl Default for MemoryAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthProvider for MemoryAuthProvider {
    fn on_state_change(&self, handler: AuthHandler) -> Box<dyn RemoteSubscription> {
        let (id, current) = {
            let mut shared = self.shared.lock();
            let id = shared.next_id;
            shared.next_id += 1;
            shared.handlers.push((id, Arc::clone(&handler)));
            (id, shared.current.clone())
        };
        handler(current);
        Box::new(AuthRegistration {
            shared: Arc::downgrade(&self.shared),
            id,
        })
    }
}

struct AuthRegistration {
    shared: Weak<Mutex<AuthShared>>,
    id: u64,
}

impl RemoteSubscription for AuthRegistration {
    fn cancel(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.lock().handlers.retain(|(id, _)| *id != self.id);
        }
    }
}

/// A running auth watch started by
/// [`SyncEngine::watch_auth`](crate::SyncEngine::watch_auth).
///
/// Dropping the watch stops it.
pub struct AuthWatch {
    registration: Option<Box<dyn RemoteSubscription>>,
    task: Option<JoinHandle<()>>,
}

impl AuthWatch {
    pub(crate) fn new(registration: Box<dyn RemoteSubscription>, task: JoinHandle<()>) -> Self {
        Self {
            registration: Some(registration),
            task: Some(task),
        }
    }

    /// Stops forwarding auth changes. Identity changes already queued are
    /// dropped.
    pub fn stop(&mut self) {
        if let Some(registration) = self.registration.take() {
            registration.cancel();
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Returns true until stopped.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for AuthWatch {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handlers_see_current_and_changes() {
        let provider = MemoryAuthProvider::new();
        provider.sign_in(Identity::new("uid-1"));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let registration = provider.on_state_change(Arc::new(move |identity| {
            sink.lock().push(identity.map(|i| i.uid));
        }));

        provider.sign_out();
        provider.sign_in(Identity::new("uid-2").with_email("b@example.com"));
        registration.cancel();
        provider.sign_out();

        assert_eq!(
            *seen.lock(),
            vec![Some("uid-1".to_string()), None, Some("uid-2".to_string())]
        );
        assert_eq!(provider.handler_count(), 0);
        assert!(provider.current().is_none());
    }
}
