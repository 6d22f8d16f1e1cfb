//! Explicit client context shared by every component.
//!
//! Holds the two pieces of process-wide mutable state: the credential token
//! and the current-session pointer. Anyone holding a `ClientContext` can read
//! them; each has exactly one writer handle, handed out once by
//! [`ClientContext::new`]. The Auth Gate owns the [`TokenWriter`], the Session
//! Directory owns the [`SelectionWriter`].

use std::{fmt, sync::Arc};

use parking_lot::RwLock;

use crate::model::Session;

#[derive(Default)]
struct Shared {
    token: RwLock<Option<String>>,
    current: RwLock<Option<Session>>,
}

/// Read-only view of shared client state. Cheap to clone.
#[derive(Clone)]
pub struct ClientContext {
    shared: Arc<Shared>,
}

/// The writer handles that belong to a freshly created context.
pub struct ContextWriters {
    /// Goes to the Auth Gate.
    pub token: TokenWriter,
    /// Goes to the Session Directory.
    pub selection: SelectionWriter,
}

impl ClientContext {
    /// Create a context and its single set of writer handles.
    #[must_use]
    pub fn new() -> (Self, ContextWriters) {
        let shared = Arc::new(Shared::default());
        let writers = ContextWriters {
            token: TokenWriter {
                shared: Arc::clone(&shared),
            },
            selection: SelectionWriter {
                shared: Arc::clone(&shared),
            },
        };
        (Self { shared }, writers)
    }

    /// Current credential token, if any.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.shared.token.read().clone()
    }

    #[must_use]
    pub fn has_token(&self) -> bool {
        self.shared.token.read().is_some()
    }

    /// Currently selected session, if any.
    #[must_use]
    pub fn current_session(&self) -> Option<Session> {
        self.shared.current.read().clone()
    }

    /// Name of the currently selected session.
    #[must_use]
    pub fn current_session_name(&self) -> Option<String> {
        self.shared.current.read().as_ref().map(|s| s.name.clone())
    }
}

impl fmt::Debug for ClientContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientContext")
            .field("has_token", &self.has_token())
            .field("current_session", &self.current_session_name())
            .finish()
    }
}

/// Sole writer of the credential token.
pub struct TokenWriter {
    shared: Arc<Shared>,
}

impl TokenWriter {
    /// Replace the token.
    pub fn set(&self, token: impl Into<String>) {
        *self.shared.token.write() = Some(token.into());
    }

    /// Clear the token, returning what was stored.
    ///
    /// Only the first of several concurrent callers observes `Some`.
    pub fn take(&self) -> Option<String> {
        self.shared.token.write().take()
    }
}

/// Sole writer of the current-session pointer.
pub struct SelectionWriter {
    shared: Arc<Shared>,
}

impl SelectionWriter {
    /// Point at `session`, or at nothing.
    pub fn set(&self, session: Option<Session>) {
        *self.shared.current.write() = session;
    }

    /// Clear the pointer if it names `name`. Returns whether it was cleared.
    pub fn clear_if(&self, name: &str) -> bool {
        let mut current = self.shared.current.write();
        if current.as_ref().is_some_and(|s| s.name == name) {
            *current = None;
            true
        } else {
            false
        }
    }
}
