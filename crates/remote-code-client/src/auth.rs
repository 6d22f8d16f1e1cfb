//! Auth gate.
//!
//! Sole writer of the credential token. Every outbound call reads the token
//! through the gate and reports authentication rejections back to it.
//!
//! A rejection of the login call is returned to the caller and has no other
//! effect. Any other rejection clears the token (memory and store) and
//! redirects to the login boundary. The redirect is armed once per
//! authenticated period, so concurrent rejections produce one redirect.

use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use parking_lot::RwLock;
use remote_code_core::{ClientContext, RejectionSink, TokenStore, TokenWriter};
use tokio::sync::watch;

/// Authentication state, observable through [`AuthGate::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No token. The client sits at the login boundary.
    Anonymous,
    Authenticated,
    /// The backend rejected the token and the client was redirected.
    Expired,
}

/// Which kind of call a rejection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Login,
    Authenticated,
}

type RedirectHandler = Arc<dyn Fn() + Send + Sync>;

/// Owner of the credential token and the login redirect.
pub struct AuthGate {
    context: ClientContext,
    token: TokenWriter,
    store: Arc<dyn TokenStore>,
    redirect_armed: AtomicBool,
    redirects: RwLock<Vec<RedirectHandler>>,
    state: watch::Sender<AuthState>,
}

impl AuthGate {
    /// Create the gate, restoring a stored token if there is one.
    #[must_use]
    pub fn new(context: ClientContext, token: TokenWriter, store: Arc<dyn TokenStore>) -> Self {
        let restored = match store.load() {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!("Failed to load stored token: {e}");
                None
            }
        };
        let authenticated = restored.is_some();
        if let Some(stored) = restored {
            token.set(stored);
            tracing::debug!("Restored stored token");
        }
        let (state, _) = watch::channel(if authenticated {
            AuthState::Authenticated
        } else {
            AuthState::Anonymous
        });

        Self {
            context,
            token,
            store,
            redirect_armed: AtomicBool::new(authenticated),
            redirects: RwLock::new(Vec::new()),
            state,
        }
    }

    #[must_use]
    pub const fn context(&self) -> &ClientContext {
        &self.context
    }

    /// Token to attach to the next call.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.context.token()
    }

    #[must_use]
    pub fn state(&self) -> AuthState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Run `handler` on every redirect to the login boundary.
    pub fn on_redirect<F>(&self, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.redirects.write().push(Arc::new(handler));
    }

    /// Install the token from a successful login.
    pub fn login_succeeded(&self, token: &str) {
        self.token.set(token);
        if let Err(e) = self.store.save(token) {
            tracing::warn!("Failed to persist token: {e}");
        }
        self.redirect_armed.store(true, Ordering::Release);
        self.state.send_replace(AuthState::Authenticated);
        tracing::info!("Logged in");
    }

    /// Forget the token without redirecting.
    pub fn logout(&self) {
        self.redirect_armed.store(false, Ordering::Release);
        self.token.take();
        self.clear_store();
        self.state.send_replace(AuthState::Anonymous);
        tracing::info!("Logged out");
    }

    /// Handle a 401 from a call that was sent with `used` as its token.
    ///
    /// Returns whether this rejection triggered the redirect.
    pub fn reject(&self, kind: CallKind, used: Option<&str>) -> bool {
        if kind == CallKind::Login {
            return false;
        }
        match self.context.token() {
            // A newer token was installed while the call was in flight.
            Some(current) if used != Some(current.as_str()) => {
                tracing::debug!("Ignoring rejection of a replaced token");
                false
            }
            _ => self.expire(),
        }
    }

    fn expire(&self) -> bool {
        self.token.take();
        self.clear_store();
        if !self.redirect_armed.swap(false, Ordering::AcqRel) {
            return false;
        }

        tracing::info!("Credentials rejected, redirecting to login");
        self.state.send_replace(AuthState::Expired);
        let handlers = self.redirects.read().clone();
        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler())).is_err() {
                tracing::error!("Redirect handler panicked");
            }
        }
        true
    }

    fn clear_store(&self) {
        if let Err(e) = self.store.clear() {
            tracing::warn!("Failed to clear stored token: {e}");
        }
    }
}

impl RejectionSink for AuthGate {
    fn credentials_rejected(&self, used: Option<&str>) {
        self.reject(CallKind::Authenticated, used);
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::atomic::AtomicUsize, thread};

    use super::*;
    use crate::storage::MemoryTokenStore;

    fn make_gate(store: Arc<MemoryTokenStore>) -> (AuthGate, Arc<AtomicUsize>) {
        let (ctx, writers) = ClientContext::new();
        let gate = AuthGate::new(ctx, writers.token, store);
        let redirects = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&redirects);
        gate.on_redirect(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (gate, redirects)
    }

    #[test]
    fn test_restores_stored_token() {
        let (gate, _) = make_gate(Arc::new(MemoryTokenStore::with_token("saved")));
        assert_eq!(gate.token().as_deref(), Some("saved"));
        assert_eq!(gate.state(), AuthState::Authenticated);

        let (gate, _) = make_gate(Arc::new(MemoryTokenStore::new()));
        assert_eq!(gate.token(), None);
        assert_eq!(gate.state(), AuthState::Anonymous);
    }

    #[test]
    fn test_login_rejection_has_no_side_effect() {
        let store = Arc::new(MemoryTokenStore::new());
        let (gate, redirects) = make_gate(Arc::clone(&store));

        assert!(!gate.reject(CallKind::Login, None));
        assert_eq!(gate.token(), None);
        assert_eq!(store.load().unwrap(), None);
        assert_eq!(redirects.load(Ordering::SeqCst), 0);
        assert_eq!(gate.state(), AuthState::Anonymous);
    }

    #[test]
    fn test_rejection_clears_and_redirects_once() {
        let store = Arc::new(MemoryTokenStore::new());
        let (gate, redirects) = make_gate(Arc::clone(&store));
        gate.login_succeeded("tok");
        assert_eq!(store.load().unwrap().as_deref(), Some("tok"));
        let mut state = gate.subscribe();

        let gate = Arc::new(gate);
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let gate = Arc::clone(&gate);
                thread::spawn(move || gate.reject(CallKind::Authenticated, Some("tok")))
            })
            .collect();
        let fired = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|fired| *fired)
            .count();

        assert_eq!(fired, 1);
        assert_eq!(redirects.load(Ordering::SeqCst), 1);
        assert_eq!(gate.token(), None);
        assert_eq!(store.load().unwrap(), None);
        assert!(state.has_changed().unwrap());
        assert_eq!(*state.borrow_and_update(), AuthState::Expired);
    }

    #[test]
    fn test_rejection_of_replaced_token_is_ignored() {
        let (gate, redirects) = make_gate(Arc::new(MemoryTokenStore::new()));
        gate.login_succeeded("old");
        gate.login_succeeded("new");

        assert!(!gate.reject(CallKind::Authenticated, Some("old")));
        assert_eq!(gate.token().as_deref(), Some("new"));
        assert_eq!(redirects.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_rearmed_after_login() {
        let (gate, redirects) = make_gate(Arc::new(MemoryTokenStore::new()));
        gate.login_succeeded("a");
        assert!(gate.reject(CallKind::Authenticated, Some("a")));
        assert!(!gate.reject(CallKind::Authenticated, None));

        gate.login_succeeded("b");
        assert!(gate.reject(CallKind::Authenticated, Some("b")));
        assert_eq!(redirects.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_logout_does_not_redirect() {
        let store = Arc::new(MemoryTokenStore::new());
        let (gate, redirects) = make_gate(Arc::clone(&store));
        gate.login_succeeded("tok");

        gate.logout();
        assert_eq!(gate.state(), AuthState::Anonymous);
        assert_eq!(store.load().unwrap(), None);
        assert!(!gate.reject(CallKind::Authenticated, None));
        assert_eq!(redirects.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handshake_rejection_via_sink() {
        let (gate, redirects) = make_gate(Arc::new(MemoryTokenStore::with_token("tok")));
        let sink: &dyn RejectionSink = &gate;
        sink.credentials_rejected(Some("tok"));
        sink.credentials_rejected(Some("tok"));
        assert_eq!(gate.token(), None);
        assert_eq!(redirects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handshake_rejection_of_replaced_token_is_ignored() {
        let (gate, redirects) = make_gate(Arc::new(MemoryTokenStore::with_token("old")));
        gate.login_succeeded("fresh");

        let sink: &dyn RejectionSink = &gate;
        sink.credentials_rejected(Some("old"));
        assert_eq!(gate.token().as_deref(), Some("fresh"));
        assert_eq!(gate.state(), AuthState::Authenticated);
        assert_eq!(redirects.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_panicking_redirect_handler_is_isolated() {
        let (gate, redirects) = make_gate(Arc::new(MemoryTokenStore::with_token("tok")));
        gate.on_redirect(|| panic!("navigation failed"));
        let after = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&after);
        gate.on_redirect(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(gate.reject(CallKind::Authenticated, Some("tok")));
        assert_eq!(redirects.load(Ordering::SeqCst), 1);
        assert_eq!(after.load(Ordering::SeqCst), 1);
    }
}
