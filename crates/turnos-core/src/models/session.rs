//! Session models.

use serde::{Deserialize, Serialize};

/// An authenticated session granted by the auth provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    /// Account identifier
    pub uid: String,
    /// Email the session was opened with
    pub email: String,
    /// Sign-in timestamp (RFC 3339)
    pub signed_in_at: String,
}

impl Session {
    /// Open a session for an account, stamped now.
    pub fn new(uid: String, email: String) -> Self {
        Self {
            uid,
            email,
            signed_in_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// A session transition delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(Session),
    SignedOut,
}

impl From<Option<Session>> for SessionEvent {
    fn from(state: Option<Session>) -> Self {
        match state {
            Some(session) => SessionEvent::SignedIn(session),
            None => SessionEvent::SignedOut,
        }
    }
}
