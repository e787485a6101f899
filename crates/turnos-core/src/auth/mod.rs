//! Authentication collaborator.
//!
//! The record controller never verifies credentials itself. It consumes an
//! [`AuthProvider`] for sign-in/sign-out and a [`SessionSubscription`] for
//! the "is anyone signed in" signal.

mod local;

pub use local::*;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

use crate::db::DbError;
use crate::models::{Session, SessionEvent};

/// Authentication errors.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account already exists: {0}")]
    AccountExists(String),

    #[error("Invalid account data: {0}")]
    InvalidAccount(String),

    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Operations consumed from the authentication provider.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Verify credentials and open a session.
    ///
    /// Any failed verification is `InvalidCredentials`, without saying which
    /// part was wrong.
    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Session>;

    /// Close the current session, if any.
    async fn sign_out(&self) -> AuthResult<()>;

    /// Subscribe to session transitions.
    fn subscribe(&self) -> SessionSubscription;
}

/// Broadcasts the current session to subscribers.
pub struct SessionHub {
    tx: watch::Sender<Option<Session>>,
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHub {
    /// Start signed out.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Replace the current session and notify subscribers.
    pub fn publish(&self, session: Option<Session>) {
        self.tx.send_replace(session);
    }

    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription::new(self.tx.subscribe())
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Handle returned by [`AuthProvider::subscribe`].
///
/// The first [`next_event`](Self::next_event) yields the state at
/// subscription time; later calls wait for transitions. Transitions that
/// happen between two calls coalesce into the latest state.
pub struct SessionSubscription {
    rx: watch::Receiver<Option<Session>>,
    initial_delivered: bool,
}

impl SessionSubscription {
    fn new(rx: watch::Receiver<Option<Session>>) -> Self {
        Self {
            rx,
            initial_delivered: false,
        }
    }

    /// Session as of now, without consuming an event.
    pub fn current(&self) -> Option<Session> {
        self.rx.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Wait for the next session event. `None` once the provider is gone.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        if !self.initial_delivered {
            self.initial_delivered = true;
            return Some(self.rx.borrow_and_update().clone().into());
        }

        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone().into())
    }

    /// Stop receiving events.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initial_state_then_transitions() {
        let hub = SessionHub::new();
        let mut sub = hub.subscribe();

        assert_eq!(sub.next_event().await, Some(SessionEvent::SignedOut));

        let session = Session::new("u1".into(), "a@b.c".into());
        hub.publish(Some(session.clone()));
        assert_eq!(sub.next_event().await, Some(SessionEvent::SignedIn(session)));
        assert!(sub.is_authenticated());

        hub.publish(None);
        assert_eq!(sub.next_event().await, Some(SessionEvent::SignedOut));
        assert!(!sub.is_authenticated());
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_current_session() {
        let hub = SessionHub::new();
        let session = Session::new("u1".into(), "a@b.c".into());
        hub.publish(Some(session.clone()));

        let mut sub = hub.subscribe();
        assert_eq!(sub.current(), Some(session.clone()));
        assert_eq!(sub.next_event().await, Some(SessionEvent::SignedIn(session)));
    }

    #[tokio::test]
    async fn test_unsubscribe_and_closed_hub() {
        let hub = SessionHub::new();
        let sub = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 1);
        sub.unsubscribe();
        assert_eq!(hub.subscriber_count(), 0);

        let mut orphan = hub.subscribe();
        orphan.next_event().await;
        drop(hub);
        assert_eq!(orphan.next_event().await, None);
    }
}
