//! Success/failure events emitted after each validation attempt.

use parking_lot::RwLock;
use std::sync::Arc;

/// What a validation attempt concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEventKind {
    /// Entitled (or failed open).
    Success,
    /// Not entitled, with the stored reason.
    Failure {
        /// Failure message.
        message: String,
    },
}

/// Event scoped to one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    /// Product the attempt was for.
    pub product_id: String,
    /// Outcome.
    pub kind: AuthEventKind,
}

impl AuthEvent {
    /// `auth_<productId>_on_success` or `auth_<productId>_on_failure`.
    pub fn name(&self) -> String {
        let suffix = match self.kind {
            AuthEventKind::Success => "success",
            AuthEventKind::Failure { .. } => "failure",
        };
        format!("auth_{}_on_{}", self.product_id, suffix)
    }

    /// Whether this is a success event.
    pub fn is_success(&self) -> bool {
        self.kind == AuthEventKind::Success
    }
}

/// Listener callback.
pub type AuthListener = Arc<dyn Fn(&AuthEvent) + Send + Sync>;

/// Fan-out to subscribed listeners.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<AuthListener>>,
}

impl EventBus {
    /// Add a listener.
    pub fn subscribe(&self, listener: AuthListener) {
        self.listeners.write().push(listener);
    }

    /// Deliver an event to every listener.
    pub fn emit(&self, event: &AuthEvent) {
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener(event);
        }
    }
}
