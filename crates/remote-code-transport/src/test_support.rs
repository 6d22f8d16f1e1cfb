//! In-process session backend for transport tests.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Router,
    extract::{
        Path, Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};

const CLOSE_MARKER: &str = "__close__";

#[derive(Clone)]
struct ServerState {
    accepted: Arc<AtomicUsize>,
    live: Arc<AtomicUsize>,
    tokens: Arc<Mutex<Vec<Option<String>>>>,
    push: broadcast::Sender<String>,
    received: mpsc::UnboundedSender<String>,
}

/// WebSocket server mimicking `/api/ws/{session}`.
pub struct TestServer {
    addr: std::net::SocketAddr,
    state: ServerState,
    received: mpsc::UnboundedReceiver<String>,
}

impl TestServer {
    /// Token the server refuses with 401.
    pub const EXPIRED_TOKEN: &'static str = "expired";

    pub async fn start() -> Self {
        let (push, _) = broadcast::channel(64);
        let (received_tx, received) = mpsc::unbounded_channel();
        let state = ServerState {
            accepted: Arc::new(AtomicUsize::new(0)),
            live: Arc::new(AtomicUsize::new(0)),
            tokens: Arc::new(Mutex::new(Vec::new())),
            push,
            received: received_tx,
        };

        let app = Router::new()
            .route("/api/ws/{session}", get(ws_route))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            received,
        }
    }

    pub fn ws_base(&self) -> String {
        format!("ws://{}/api", self.addr)
    }

    /// Handshakes accepted so far.
    pub fn accepted(&self) -> usize {
        self.state.accepted.load(Ordering::SeqCst)
    }

    /// `token` query values seen on every handshake attempt.
    pub fn tokens(&self) -> Vec<Option<String>> {
        self.state.tokens.lock().clone()
    }

    /// Send a raw text frame to every live client.
    pub fn push(&self, text: &str) {
        let _ = self.state.push.send(text.to_string());
    }

    /// Close every live client from the server side.
    pub fn drop_clients(&self) {
        self.push(CLOSE_MARKER);
    }

    pub async fn wait_for_clients(&self, n: usize) {
        let state = &self.state;
        tokio::time::timeout(Duration::from_secs(2), async {
            while state.live.load(Ordering::SeqCst) < n {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("client never attached");
    }

    pub async fn wait_for_accepted(&self, n: usize) {
        let state = &self.state;
        tokio::time::timeout(Duration::from_secs(5), async {
            while state.accepted.load(Ordering::SeqCst) < n {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("handshake never happened");
    }

    /// Next text frame received from any client.
    pub async fn next_received(&mut self) -> String {
        tokio::time::timeout(Duration::from_secs(2), self.received.recv())
            .await
            .expect("timed out waiting for client frame")
            .expect("server channel closed")
    }
}

async fn ws_route(
    ws: WebSocketUpgrade,
    Path(_session): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    State(state): State<ServerState>,
) -> Response {
    let token = query.get("token").cloned();
    state.tokens.lock().push(token.clone());
    if token.as_deref() == Some(TestServer::EXPIRED_TOKEN) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    state.accepted.fetch_add(1, Ordering::SeqCst);
    ws.on_upgrade(move |socket| serve_socket(socket, state))
}

async fn serve_socket(socket: WebSocket, state: ServerState) {
    let (mut sender, mut receiver) = socket.split();
    let mut push = state.push.subscribe();
    state.live.fetch_add(1, Ordering::SeqCst);

    loop {
        tokio::select! {
            pushed = push.recv() => match pushed {
                Ok(text) if text == CLOSE_MARKER => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
                Ok(text) => {
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let _ = state.received.send(text.as_str().to_owned());
                }
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    state.live.fetch_sub(1, Ordering::SeqCst);
}
