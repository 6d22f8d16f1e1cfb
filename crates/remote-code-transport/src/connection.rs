//! WebSocket connection bound to one session.
//!
//! State machine: `Connecting -> Open -> Closed`, with `Connecting -> Closed`
//! on handshake failure and `Open -> Closed` on explicit close or transport
//! failure. No reconnection happens here; see [`crate::SessionChannel`].
//!
//! Lifecycle and inbound frames are reported as [`TransportEvent`]s on the
//! channel returned by [`Connection::new`], in wire order. `Disconnected` is
//! emitted exactly once per transition to `Closed`, and no `Frame` follows it
//! until the next `Connected`.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::{
    error::TransportError,
    protocol::{Frame, OutboundMessage},
};

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// Event reported by a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Transitioned to `Open`.
    Connected,
    /// A well-formed inbound frame.
    Frame(Frame),
    /// Handshake refused with 401. Carries the token the handshake was
    /// attempted with. Followed by `Disconnected`.
    Unauthorized(Option<String>),
    /// Transport failure. Followed by `Disconnected`.
    Error(String),
    /// Transitioned to `Closed`.
    Disconnected,
}

struct Inner {
    state: ConnectionState,
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<Message>>,
    reader: Option<JoinHandle<()>>,
}

/// Duplex channel to one session.
pub struct Connection {
    ws_base: String,
    session: String,
    inner: Arc<Mutex<Inner>>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl Connection {
    /// Create a closed connection for `session` under `ws_base`
    /// (e.g. `ws://host:9090/api`).
    #[must_use]
    pub fn new(
        ws_base: impl Into<String>,
        session: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let conn = Self {
            ws_base: ws_base.into(),
            session: session.into(),
            inner: Arc::new(Mutex::new(Inner {
                state: ConnectionState::Closed,
                generation: 0,
                outbound: None,
                reader: None,
            })),
            events,
        };
        (conn, rx)
    }

    /// Session this connection is bound to.
    #[must_use]
    pub fn session(&self) -> &str {
        &self.session
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Handshake URL: `{ws_base}/ws/{session}?token={token}`.
    ///
    /// # Errors
    /// Returns error if the base is not a valid absolute URL.
    pub fn url(&self, token: Option<&str>) -> Result<Url, TransportError> {
        let mut url = Url::parse(&self.ws_base)?;
        url.path_segments_mut()
            .map_err(|()| TransportError::InvalidUrl(self.ws_base.clone()))?
            .pop_if_empty()
            .push("ws")
            .push(&self.session);
        if let Some(token) = token {
            url.query_pairs_mut().append_pair("token", token);
        }
        Ok(url)
    }

    /// Open the channel. A no-op while already connecting or open.
    ///
    /// # Errors
    /// Returns error if the URL is invalid or the handshake fails. The
    /// failure is also reported as events followed by `Disconnected`.
    pub async fn connect(&self, token: Option<&str>) -> Result<(), TransportError> {
        let url = self.url(token)?;

        let generation = {
            let mut inner = self.inner.lock();
            if inner.state != ConnectionState::Closed {
                tracing::debug!(session = %self.session, state = ?inner.state, "Connect ignored");
                return Ok(());
            }
            inner.state = ConnectionState::Connecting;
            inner.generation += 1;
            inner.generation
        };

        tracing::debug!(session = %self.session, "Connecting");
        let stream = match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((stream, _response)) => stream,
            Err(e) => {
                let err = TransportError::from(e);
                self.fail(generation, &err, token);
                return Err(err);
            }
        };

        let (sink, stream) = stream.split();
        let mut inner = self.inner.lock();
        if inner.generation != generation || inner.state != ConnectionState::Connecting {
            // Closed while the handshake was in flight; dropping the stream
            // tears the socket down.
            tracing::debug!(session = %self.session, "Connection closed during handshake");
            return Ok(());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        inner.state = ConnectionState::Open;
        inner.outbound = Some(tx);
        // Emitted before the reader starts so it precedes every frame.
        let _ = self.events.send(TransportEvent::Connected);
        tracing::info!(session = %self.session, "Connected");

        tokio::spawn(write_loop(sink, rx));
        inner.reader = Some(tokio::spawn(read_loop(
            stream,
            self.session.clone(),
            generation,
            Arc::clone(&self.inner),
            self.events.clone(),
        )));
        Ok(())
    }

    /// Send a message. Dropped, not queued, unless the state is `Open`.
    ///
    /// Returns whether the message was handed to the socket writer.
    pub fn send(&self, msg: &OutboundMessage) -> bool {
        let inner = self.inner.lock();
        let Some(outbound) = inner.outbound.as_ref().filter(|_| inner.state == ConnectionState::Open)
        else {
            tracing::debug!(session = %self.session, state = ?inner.state, "Dropping send on closed channel");
            return false;
        };
        match msg.to_json() {
            Ok(json) => outbound.send(Message::Text(json.into())).is_ok(),
            Err(e) => {
                tracing::error!(session = %self.session, "Failed to serialize message: {e}");
                false
            }
        }
    }

    /// Close the channel. Idempotent.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if inner.state == ConnectionState::Closed {
            return;
        }
        inner.state = ConnectionState::Closed;
        // Dropping the sender lets the writer flush a close frame and exit.
        inner.outbound = None;
        if let Some(reader) = inner.reader.take() {
            reader.abort();
        }
        let _ = self.events.send(TransportEvent::Disconnected);
        tracing::info!(session = %self.session, "Closed");
    }

    fn fail(&self, generation: u64, err: &TransportError, token: Option<&str>) {
        let mut inner = self.inner.lock();
        if inner.generation != generation || inner.state != ConnectionState::Connecting {
            return;
        }
        inner.state = ConnectionState::Closed;
        tracing::warn!(session = %self.session, "Connection failed: {err}");
        let event = match err {
            TransportError::Unauthorized => TransportEvent::Unauthorized(token.map(str::to_owned)),
            other => TransportEvent::Error(other.to_string()),
        };
        let _ = self.events.send(event);
        let _ = self.events.send(TransportEvent::Disconnected);
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        inner.outbound = None;
        if let Some(reader) = inner.reader.take() {
            reader.abort();
        }
    }
}

async fn write_loop<S>(mut sink: S, mut rx: mpsc::UnboundedReceiver<Message>)
where
    S: futures::Sink<Message> + Unpin,
{
    while let Some(msg) = rx.recv().await {
        if sink.send(msg).await.is_err() {
            return;
        }
    }
    let _ = sink.close().await;
}

async fn read_loop<S>(
    mut stream: S,
    session: String,
    generation: u64,
    inner: Arc<Mutex<Inner>>,
    events: mpsc::UnboundedSender<TransportEvent>,
) where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let mut failure = None;
    while let Some(msg) = stream.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text.to_string(),
            Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                Ok(s) => s,
                Err(_) => {
                    tracing::warn!(%session, "Dropping non UTF-8 binary frame");
                    continue;
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::error!(%session, "WebSocket error: {e}");
                failure = Some(e.to_string());
                break;
            }
        };

        match Frame::parse(&text) {
            Ok(frame) => {
                // Queued under the lock so no frame can follow the
                // Disconnected of a concurrent close().
                let current = inner.lock();
                if current.generation != generation || current.state != ConnectionState::Open {
                    tracing::debug!(%session, "Dropping frame for a closed channel");
                    return;
                }
                let _ = events.send(TransportEvent::Frame(frame));
            }
            Err(e) => tracing::warn!(%session, "Dropping malformed frame: {e}"),
        }
    }

    let mut inner = inner.lock();
    if inner.generation == generation && inner.state != ConnectionState::Closed {
        inner.state = ConnectionState::Closed;
        inner.outbound = None;
        inner.reader = None;
        if let Some(message) = failure {
            let _ = events.send(TransportEvent::Error(message));
        }
        let _ = events.send(TransportEvent::Disconnected);
        tracing::info!(%session, "Disconnected by peer");
    }
}
