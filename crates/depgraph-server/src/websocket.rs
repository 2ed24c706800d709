//! WebSocket handling for streamed searches

use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use depgraph_core::{GraphJson, PackageManifest};
use depgraph_discovery::{CancelToken, DiscoveryRequest, Progress};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{ApiError, ServerState, BAD_REQUEST};

/// WebSocket message types for client-server communication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WsMessage {
    /// Client starts a registry search, superseding any running one
    Search { name: String },
    /// Client starts a search from a package.json body
    Upload { manifest: serde_json::Value },
    /// Server reports traversal progress
    #[serde(rename_all = "camelCase")]
    Progress {
        in_flight: usize,
        discovered: usize,
        package: String,
    },
    /// Server sends the finished graph
    Graph { graph: GraphJson },
    /// Server reports a failed search
    Error { code: i32, message: String },
}

impl From<Progress> for WsMessage {
    fn from(progress: Progress) -> Self {
        WsMessage::Progress {
            in_flight: progress.in_flight,
            discovered: progress.discovered,
            package: progress.package.into_string(),
        }
    }
}

impl From<ApiError> for WsMessage {
    fn from(err: ApiError) -> Self {
        let body = err.body();
        WsMessage::Error {
            code: body.code,
            message: body.message,
        }
    }
}

/// Handle WebSocket upgrade requests
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<ServerState>) {
    info!("New WebSocket connection established");

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();

    // Forward outgoing messages from searches to the client
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    warn!("Failed to serialize WebSocket message: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(json)).await.is_err() {
                debug!("Failed to send message to WebSocket client");
                break;
            }
        }
    });

    let searches = SearchSlot::default();
    let slot = searches.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    debug!("Received WebSocket message: {}", text);
                    let request = match parse_request(&text) {
                        Ok(request) => request,
                        Err(reply) => {
                            let _ = tx.send(reply);
                            continue;
                        }
                    };

                    let cancel = slot.start();
                    tokio::spawn(run_search(Arc::clone(&state), request, tx.clone(), cancel));
                }
                Message::Close(_) => {
                    debug!("WebSocket client disconnected");
                    break;
                }
                _ => {}
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }
    searches.cancel();

    info!("WebSocket connection closed");
}

/// The running search of one connection, shared between the receive loop
/// and connection teardown.
#[derive(Debug, Clone, Default)]
struct SearchSlot(Arc<Mutex<Option<CancelToken>>>);

impl SearchSlot {
    fn lock(&self) -> MutexGuard<'_, Option<CancelToken>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Cancel the running search, if any, and register a new one.
    fn start(&self) -> CancelToken {
        let cancel = CancelToken::new();
        if let Some(previous) = self.lock().replace(cancel.clone()) {
            debug!("Superseding running search");
            previous.cancel();
        }
        cancel
    }

    fn cancel(&self) {
        if let Some(running) = self.lock().take() {
            running.cancel();
        }
    }
}

/// Turn a client message into a traversal request, or the error to send back.
fn parse_request(text: &str) -> Result<DiscoveryRequest, WsMessage> {
    let msg = serde_json::from_str::<WsMessage>(text).map_err(|e| {
        warn!("Failed to parse WebSocket message: {}", e);
        WsMessage::Error {
            code: BAD_REQUEST,
            message: format!("unrecognized message: {}", e),
        }
    })?;

    match msg {
        WsMessage::Search { name } => Ok(DiscoveryRequest::Registry { root: name }),
        WsMessage::Upload { manifest } => PackageManifest::from_value(&manifest)
            .map(|manifest| DiscoveryRequest::from_manifest(&manifest))
            .map_err(|e| ApiError::from(e).into()),
        other => Err(WsMessage::Error {
            code: BAD_REQUEST,
            message: format!("unexpected client message: {:?}", other),
        }),
    }
}

async fn run_search(
    state: Arc<ServerState>,
    request: DiscoveryRequest,
    tx: mpsc::UnboundedSender<WsMessage>,
    cancel: CancelToken,
) {
    let progress_tx = tx.clone();
    let on_progress = move |progress: Progress| {
        let _ = progress_tx.send(progress.into());
    };

    match state.engine.discover(request, on_progress, &cancel).await {
        Ok(report) => {
            let _ = tx.send(WsMessage::Graph {
                graph: report.graph.export(),
            });
        }
        Err(depgraph_discovery::DiscoveryError::Cancelled) => {
            debug!("Search cancelled");
        }
        Err(e) => {
            let _ = tx.send(ApiError::from(e).into());
        }
    }
}
