// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! RPC Server Implementation
//!
//! Binds the router to HTTP (single-shot) and WebSocket (duplex) transports.

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

use super::handlers::RpcHandler;
use super::router::paths;
use super::session::Session;

/// RPC Server state
#[derive(Clone)]
pub struct RpcServerState {
    pub handler: Arc<RpcHandler>,
    pub connected_clients: Arc<RwLock<Vec<String>>>,
    pub session_name: String,
}

/// RPC Server
pub struct RpcServer {
    state: RpcServerState,
}

impl RpcServer {
    /// Create a new RPC server
    pub fn new(handler: Arc<RpcHandler>, session_name: impl Into<String>) -> Self {
        Self {
            state: RpcServerState {
                handler,
                connected_clients: Arc::new(RwLock::new(Vec::new())),
                session_name: session_name.into(),
            },
        }
    }

    /// Get the Axum router for the RPC server
    pub fn router(&self) -> Router {
        Router::new()
            .route(paths::RPC_HTTP, post(handle_rpc_request))
            .route(paths::RPC_HEALTH, get(handle_rpc_health))
            .route(paths::RPC_WS, get(handle_rpc_websocket))
            .with_state(self.state.clone())
    }

    pub fn state(&self) -> RpcServerState {
        self.state.clone()
    }
}

/// Handle health check (GET /rpc/health)
async fn handle_rpc_health(State(state): State<RpcServerState>) -> Json<serde_json::Value> {
    let clients = state.connected_clients.read().await;
    let hooks = state.handler.hooks();
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "connectedClients": clients.len(),
        "session": state.session_name,
        "hooks": {
            "enabled": hooks.is_enabled(),
            "count": hooks.hook_count(),
        },
    }))
}

/// Handle JSON-RPC over HTTP POST. Notifications get `204 No Content`.
async fn handle_rpc_request(State(state): State<RpcServerState>, body: Bytes) -> Response {
    let session = Session::single_shot();
    match state.handler.handle_bytes(&body, &session).await {
        Some(reply) => ([(header::CONTENT_TYPE, "application/json")], reply).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// Handle JSON-RPC over WebSocket
async fn handle_rpc_websocket(
    State(state): State<RpcServerState>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_ws_connection(state, socket))
}

/// Handle WebSocket connection
///
/// Every frame is dispatched on its own task, so a slow call never holds up
/// the next one. Responses and event notifications share one writer task.
async fn handle_ws_connection(state: RpcServerState, socket: WebSocket) {
    let client_id = uuid::Uuid::new_v4().to_string();
    info!(client_id = %client_id, "RPC WebSocket client connected");

    // Track connected client
    {
        let mut clients = state.connected_clients.write().await;
        clients.push(client_id.clone());
    }

    let (mut sink, mut stream) = socket.split();
    let (text_tx, mut text_rx) = mpsc::unbounded_channel::<String>();
    let (control_tx, mut control_rx) = mpsc::unbounded_channel::<Message>();

    let writer_id = client_id.clone();
    let writer = tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                Some(text) = text_rx.recv() => Message::Text(text),
                Some(control) = control_rx.recv() => control,
                else => break,
            };
            if let Err(e) = sink.send(message).await {
                debug!(client_id = %writer_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    let session = Session::duplex(client_id.clone(), text_tx.clone());

    while let Some(frame) = stream.next().await {
        let bytes = match frame {
            Ok(Message::Text(text)) => text.into_bytes(),
            Ok(Message::Binary(data)) => data,
            Ok(Message::Ping(data)) => {
                let _ = control_tx.send(Message::Pong(data));
                continue;
            }
            Ok(Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => {
                info!(client_id = %client_id, "RPC WebSocket client disconnected");
                break;
            }
            Err(e) => {
                error!(client_id = %client_id, error = %e, "WebSocket error");
                break;
            }
        };

        let handler = state.handler.clone();
        let session = session.clone();
        let outbound = text_tx.clone();
        tokio::spawn(async move {
            if let Some(reply) = handler.handle_bytes(&bytes, &session).await {
                if outbound.send(reply).is_err() {
                    warn!(client_id = %session.id, "Reply dropped, connection closed");
                }
            }
        });
    }

    session.close();
    writer.abort();

    // Remove client from tracking
    {
        let mut clients = state.connected_clients.write().await;
        clients.retain(|c| c != &client_id);
    }
}
