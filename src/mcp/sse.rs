//! Server-Sent Events transport.
//!
//! Serves the dispatcher over HTTP: `GET /sse` opens a per-client
//! event stream whose first event names the message endpoint,
//! `POST /message?sessionId=<id>` dispatches a JSON-RPC request and
//! both returns the response and pushes it down the client's stream,
//! and `GET /health` reports connected-client count. Each client owns
//! a bounded outbound queue; a full queue drops the event silently
//! while the HTTP response is still delivered.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream::{self, Stream, StreamExt};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::dispatcher::dispatch;
use super::protocol::{JsonRpcRequest, JsonRpcResponse};

/// Outbound queue depth per connected client.
const CLIENT_QUEUE_DEPTH: usize = 64;

/// Shared state for the SSE transport.
struct SseState {
    work_dir: PathBuf,
    plans_dir: Option<PathBuf>,
    clients: Mutex<HashMap<String, mpsc::Sender<String>>>,
    next_id: AtomicU64,
}

impl SseState {
    fn new(work_dir: PathBuf, plans_dir: Option<PathBuf>) -> Self {
        Self {
            work_dir,
            plans_dir,
            clients: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a new client, returning its session ID and event queue.
    fn register(&self) -> (String, mpsc::Receiver<String>) {
        let id = format!("client-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let (tx, rx) = mpsc::channel(CLIENT_QUEUE_DEPTH);
        self.clients.lock().insert(id.clone(), tx);
        (id, rx)
    }

    fn remove(&self, id: &str) {
        self.clients.lock().remove(id);
    }

    fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    /// Enqueue a payload for a session; a full queue drops it.
    fn push(&self, id: &str, payload: String) {
        let sender = self.clients.lock().get(id).cloned();
        if let Some(sender) = sender {
            if sender.try_send(payload).is_err() {
                tracing::warn!(client = %id, "Client queue full, dropping message");
            }
        }
    }
}

/// Removes the session from the registry when its stream is dropped.
struct ClientGuard {
    id: String,
    state: Arc<SseState>,
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.state.remove(&self.id);
        tracing::info!(client = %self.id, "SSE client disconnected");
    }
}

/// Start the SSE server on `127.0.0.1:<port>` and serve until shutdown.
pub async fn serve(
    port: u16,
    work_dir: PathBuf,
    plans_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let state = Arc::new(SseState::new(work_dir, plans_dir));
    let app = router(state);

    let addr: SocketAddr = format!("127.0.0.1:{port}").parse().context("parse bind address")?;
    let listener =
        tokio::net::TcpListener::bind(addr).await.context("bind SSE listener")?;
    tracing::info!(%addr, "SSE server listening");
    axum::serve(listener, app).await.context("serving SSE transport")
}

fn router(state: Arc<SseState>) -> Router {
    Router::new()
        .route("/sse", get(handle_sse))
        .route("/message", post(handle_message))
        .route("/health", get(handle_health))
        .with_state(state)
}

async fn handle_sse(
    State(state): State<Arc<SseState>>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (client_id, receiver) = state.register();
    tracing::info!(client = %client_id, "SSE client connected");

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("127.0.0.1")
        .to_string();
    let endpoint = format!("http://{host}/message?sessionId={client_id}");

    let guard = ClientGuard { id: client_id, state: Arc::clone(&state) };
    let endpoint_event = Event::default().event("endpoint").data(endpoint);
    let stream = stream::once(async move { Ok::<Event, Infallible>(endpoint_event) })
        .chain(
            ReceiverStream::new(receiver)
                .map(|payload| Ok(Event::default().event("message").data(payload))),
        )
        .map(move |event| {
            // Tie the session's lifetime to the stream.
            let _ = &guard;
            event
        });

    Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("keep-alive"))
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

async fn handle_message(
    State(state): State<Arc<SseState>>,
    Query(query): Query<MessageQuery>,
    body: String,
) -> (StatusCode, Json<JsonRpcResponse>) {
    let request: JsonRpcRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(JsonRpcResponse::error(None, -32700, "Parse error")),
            );
        }
    };

    // Dispatch may run shell commands or block on I/O.
    let dispatch_state = Arc::clone(&state);
    let response = tokio::task::spawn_blocking(move || {
        dispatch(&request, &dispatch_state.work_dir, dispatch_state.plans_dir.as_deref())
    })
    .await
    .unwrap_or_else(|e| {
        JsonRpcResponse::error(None, -32603, format!("Internal error: {e}"))
    });

    if let Some(session_id) = query.session_id.as_deref() {
        if let Ok(payload) = serde_json::to_string(&response) {
            state.push(session_id, payload);
        }
    }

    (StatusCode::OK, Json(response))
}

async fn handle_health(State(state): State<Arc<SseState>>) -> Json<serde_json::Value> {
    Json(json!({"status": "ok", "connectedAgents": state.client_count()}))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> Arc<SseState> {
        Arc::new(SseState::new(PathBuf::from("/tmp"), None))
    }

    #[test]
    fn test_register_and_remove_clients() {
        let state = test_state();
        assert_eq!(state.client_count(), 0);

        let (id_a, _rx_a) = state.register();
        let (id_b, _rx_b) = state.register();
        assert_ne!(id_a, id_b);
        assert_eq!(state.client_count(), 2);

        state.remove(&id_a);
        assert_eq!(state.client_count(), 1);
    }

    #[test]
    fn test_push_delivers_to_session_queue() {
        let state = test_state();
        let (id, mut rx) = state.register();
        state.push(&id, "payload".to_string());
        assert_eq!(rx.try_recv().unwrap(), "payload");
    }

    #[test]
    fn test_push_to_unknown_session_is_noop() {
        let state = test_state();
        state.push("client-404", "dropped".to_string());
    }

    #[test]
    fn test_full_queue_drops_silently() {
        let state = test_state();
        let (id, mut rx) = state.register();
        for i in 0..CLIENT_QUEUE_DEPTH + 10 {
            state.push(&id, format!("msg-{i}"));
        }
        // Only the queue depth's worth of events survive.
        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, CLIENT_QUEUE_DEPTH);
    }

    #[test]
    fn test_guard_removes_session_on_drop() {
        let state = test_state();
        let (id, _rx) = state.register();
        {
            let _guard = ClientGuard { id: id.clone(), state: Arc::clone(&state) };
            assert_eq!(state.client_count(), 1);
        }
        assert_eq!(state.client_count(), 0);
    }
}
