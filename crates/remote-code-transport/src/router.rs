//! Command/event router.
//!
//! Inbound: [`Router::dispatch`] takes each [`TransportEvent`] in order and
//! fans it out to three independent subscriber lists (message, connect,
//! disconnect). Handlers run synchronously in registration order; a handler
//! that fails or panics is logged and the remaining handlers still run.
//!
//! Outbound: `send_command`/`send_keys` wrap text in the matching message
//! type and hand it to the [`Connection`].

use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use parking_lot::RwLock;

use crate::{
    connection::{Connection, TransportEvent},
    protocol::{InboundMessage, OutboundMessage, ServerEvent},
};

/// Error a handler may return.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

type MessageHandler = Arc<dyn Fn(&InboundMessage) -> Result<(), HandlerError> + Send + Sync>;
type LifecycleHandler = Arc<dyn Fn() -> Result<(), HandlerError> + Send + Sync>;

/// Handle returned by every registration, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Registry<H> {
    entries: RwLock<Vec<(SubscriptionId, H)>>,
}

impl<H: Clone> Registry<H> {
    const fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    fn push(&self, id: SubscriptionId, handler: H) {
        self.entries.write().push((id, handler));
    }

    fn remove(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(entry, _)| *entry != id);
        entries.len() != before
    }

    /// Copy of the handlers so none run under the lock.
    fn snapshot(&self) -> Vec<(SubscriptionId, H)> {
        self.entries.read().clone()
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}

/// Demultiplexes inbound events and multiplexes outbound actions.
pub struct Router {
    connection: Arc<Connection>,
    messages: Registry<MessageHandler>,
    connects: Registry<LifecycleHandler>,
    disconnects: Registry<LifecycleHandler>,
    next_id: AtomicU64,
    connected: AtomicBool,
    last_error: RwLock<Option<String>>,
}

impl Router {
    #[must_use]
    pub fn new(connection: Arc<Connection>) -> Self {
        Self {
            connection,
            messages: Registry::new(),
            connects: Registry::new(),
            disconnects: Registry::new(),
            next_id: AtomicU64::new(1),
            connected: AtomicBool::new(false),
            last_error: RwLock::new(None),
        }
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Subscribe to decoded inbound messages.
    pub fn on_message<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&InboundMessage) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.messages.push(id, Arc::new(handler));
        id
    }

    /// Subscribe to `Open` transitions.
    pub fn on_connect<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn() -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.connects.push(id, Arc::new(handler));
        id
    }

    /// Subscribe to `Closed` transitions.
    pub fn on_disconnect<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn() -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.disconnects.push(id, Arc::new(handler));
        id
    }

    /// Remove a subscription from whichever list holds it.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.messages.remove(id) || self.connects.remove(id) || self.disconnects.remove(id)
    }

    /// Number of registered handlers across all lists.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.messages.len() + self.connects.len() + self.disconnects.len()
    }

    /// Whether the last lifecycle event was `Connected`.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Last transport error, cleared on connect.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Route one transport event to subscribers.
    pub fn dispatch(&self, event: &TransportEvent) {
        match event {
            TransportEvent::Connected => {
                self.connected.store(true, Ordering::Release);
                *self.last_error.write() = None;
                for (id, handler) in self.connects.snapshot() {
                    invoke("connect", id, || handler());
                }
            }
            TransportEvent::Disconnected => {
                self.connected.store(false, Ordering::Release);
                for (id, handler) in self.disconnects.snapshot() {
                    invoke("disconnect", id, || handler());
                }
            }
            TransportEvent::Error(message) => {
                *self.last_error.write() = Some(message.clone());
            }
            TransportEvent::Unauthorized(_) => {
                *self.last_error.write() = Some("WebSocket handshake unauthorized".to_string());
            }
            TransportEvent::Frame(frame) => {
                let Some(event) = ServerEvent::from_frame(frame) else {
                    tracing::debug!(kind = %frame.kind, "Dropping unrecognized frame");
                    return;
                };
                let msg = InboundMessage {
                    event,
                    session: frame.session.clone(),
                };
                for (id, handler) in self.messages.snapshot() {
                    invoke("message", id, || handler(&msg));
                }
            }
        }
    }

    /// Send an outbound message. Dropped unless the connection is open.
    pub fn send(&self, msg: &OutboundMessage) -> bool {
        self.connection.send(msg)
    }

    /// Submit a command line.
    pub fn send_command(&self, command: impl Into<String>) -> bool {
        self.send(&OutboundMessage::Command(command.into()))
    }

    /// Send raw keystrokes.
    pub fn send_keys(&self, keys: impl Into<String>) -> bool {
        self.send(&OutboundMessage::Keys(keys.into()))
    }

    pub fn resize(&self, cols: u16, rows: u16) -> bool {
        self.send(&OutboundMessage::Resize { cols, rows })
    }

    pub fn ping(&self) -> bool {
        self.send(&OutboundMessage::Ping)
    }

    pub(crate) fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }
}

fn invoke<F>(list: &str, id: SubscriptionId, call: F)
where
    F: FnOnce() -> Result<(), HandlerError>,
{
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(list, handler = id.0, "Handler failed: {e}"),
        Err(_) => tracing::error!(list, handler = id.0, "Handler panicked"),
    }
}
