//! Live channel to one session.
//!
//! A [`SessionChannel`] owns a [`Connection`], a [`Router`] and a dispatcher
//! task that feeds every [`TransportEvent`] to the router in order. The token
//! is read from the [`ClientContext`] on each connect.
//!
//! Reconnection is off unless a [`ReconnectPolicy`] is set. When enabled, the
//! dispatcher re-dials after an unexpected `Disconnected`. It does not after
//! an explicit [`SessionChannel::close`] or a rejected handshake. A `kicked`
//! frame means another client took the session over, so it does not re-dial
//! after that either. Nor once the context has no token.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use remote_code_core::{ClientContext, RejectionSink};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    connection::{Connection, ConnectionState, TransportEvent},
    error::TransportError,
    reconnect::ReconnectPolicy,
    router::Router,
};

/// Builder for [`SessionChannel`].
pub struct SessionChannelBuilder {
    ws_base: String,
    session: String,
    context: ClientContext,
    policy: Option<ReconnectPolicy>,
    sink: Option<Arc<dyn RejectionSink>>,
}

impl SessionChannelBuilder {
    #[must_use]
    pub fn new(ws_base: impl Into<String>, session: impl Into<String>, context: ClientContext) -> Self {
        Self {
            ws_base: ws_base.into(),
            session: session.into(),
            context,
            policy: None,
            sink: None,
        }
    }

    /// Enable reconnection with the given policy.
    #[must_use]
    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Where to report a handshake refused with 401.
    #[must_use]
    pub fn rejection_sink(mut self, sink: Arc<dyn RejectionSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Build the channel and spawn its dispatcher. Must be called inside a
    /// tokio runtime. The channel starts closed.
    #[must_use]
    pub fn build(self) -> SessionChannel {
        let (connection, events) = Connection::new(self.ws_base, self.session);
        let router = Arc::new(Router::new(Arc::new(connection)));
        let flags = Arc::new(Flags::default());

        let dispatcher = tokio::spawn(
            Dispatcher {
                router: Arc::clone(&router),
                context: self.context.clone(),
                flags: Arc::clone(&flags),
                policy: self.policy,
                sink: self.sink,
                attempt: 0,
                retry: None,
            }
            .run(events),
        );

        SessionChannel {
            router,
            context: self.context,
            flags,
            dispatcher,
        }
    }
}

#[derive(Default)]
struct Flags {
    closed_by_user: AtomicBool,
    rejected: AtomicBool,
    kicked: AtomicBool,
}

/// Connection, router and dispatcher for one session.
pub struct SessionChannel {
    router: Arc<Router>,
    context: ClientContext,
    flags: Arc<Flags>,
    dispatcher: JoinHandle<()>,
}

impl SessionChannel {
    #[must_use]
    pub fn builder(
        ws_base: impl Into<String>,
        session: impl Into<String>,
        context: ClientContext,
    ) -> SessionChannelBuilder {
        SessionChannelBuilder::new(ws_base, session, context)
    }

    /// Open the channel with the context's current token.
    ///
    /// # Errors
    /// Returns error if the handshake fails.
    pub async fn connect(&self) -> Result<(), TransportError> {
        self.flags.closed_by_user.store(false, Ordering::Release);
        self.flags.rejected.store(false, Ordering::Release);
        self.flags.kicked.store(false, Ordering::Release);
        let token = self.context.token();
        self.router.connection().connect(token.as_deref()).await
    }

    /// Close the channel and suppress reconnection. Idempotent.
    pub fn close(&self) {
        self.flags.closed_by_user.store(true, Ordering::Release);
        self.router.connection().close();
    }

    /// Subscription surface.
    #[must_use]
    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    #[must_use]
    pub fn session(&self) -> &str {
        self.router.connection().session()
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.router.connection().state()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub fn send_command(&self, command: impl Into<String>) -> bool {
        self.router.send_command(command)
    }

    pub fn send_keys(&self, keys: impl Into<String>) -> bool {
        self.router.send_keys(keys)
    }

    pub fn resize(&self, cols: u16, rows: u16) -> bool {
        self.router.resize(cols, rows)
    }

    pub fn ping(&self) -> bool {
        self.router.ping()
    }
}

impl Drop for SessionChannel {
    fn drop(&mut self) {
        self.dispatcher.abort();
        self.close();
    }
}

struct Dispatcher {
    router: Arc<Router>,
    context: ClientContext,
    flags: Arc<Flags>,
    policy: Option<ReconnectPolicy>,
    sink: Option<Arc<dyn RejectionSink>>,
    attempt: u32,
    retry: Option<JoinHandle<()>>,
}

impl Dispatcher {
    async fn run(mut self, mut events: mpsc::UnboundedReceiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            self.router.dispatch(&event);
            match event {
                TransportEvent::Connected => {
                    self.attempt = 0;
                    self.cancel_retry();
                }
                TransportEvent::Unauthorized(used) => {
                    self.flags.rejected.store(true, Ordering::Release);
                    self.cancel_retry();
                    if let Some(sink) = &self.sink {
                        sink.credentials_rejected(used.as_deref());
                    }
                }
                TransportEvent::Frame(frame) if frame.kind == "kicked" => {
                    tracing::info!(
                        session = %self.router.connection().session(),
                        "Session taken over by another client"
                    );
                    self.flags.kicked.store(true, Ordering::Release);
                    self.cancel_retry();
                }
                TransportEvent::Disconnected => self.schedule_retry(),
                TransportEvent::Frame(_) | TransportEvent::Error(_) => {}
            }
        }
        self.cancel_retry();
    }

    fn cancel_retry(&mut self) {
        if let Some(retry) = self.retry.take() {
            retry.abort();
        }
    }

    fn schedule_retry(&mut self) {
        let Some(policy) = &self.policy else {
            return;
        };
        let session = self.router.connection().session().to_owned();
        if self.flags.closed_by_user.load(Ordering::Acquire)
            || self.flags.rejected.load(Ordering::Acquire)
            || self.flags.kicked.load(Ordering::Acquire)
        {
            return;
        }
        if !self.context.has_token() {
            tracing::debug!(%session, "No token, not reconnecting");
            return;
        }
        if !policy.allows(self.attempt) {
            tracing::warn!(%session, attempts = self.attempt, "Giving up reconnecting");
            return;
        }

        let delay = policy.delay_for(self.attempt);
        self.attempt += 1;
        tracing::info!(%session, attempt = self.attempt, ?delay, "Reconnecting");

        let router = Arc::clone(&self.router);
        let context = self.context.clone();
        let flags = Arc::clone(&self.flags);
        self.cancel_retry();
        self.retry = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if flags.closed_by_user.load(Ordering::Acquire) {
                return;
            }
            let Some(token) = context.token() else {
                return;
            };
            // Failures come back as Error + Disconnected and schedule the
            // next attempt.
            if let Err(e) = router.connection().connect(Some(&token)).await {
                tracing::debug!(%session, "Reconnect attempt failed: {e}");
            }
        }));
    }
}
