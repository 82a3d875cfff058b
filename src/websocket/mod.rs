//! WebSocket channel for live notification delivery
//!
//! Each connection is authenticated with a `token` query parameter and only
//! receives notifications addressed to its own user.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};
use uuid::Uuid;

use crate::auth::Authenticator;
use crate::notification::{LiveNotification, NotificationService};

/// Notification addressed to one user
#[derive(Debug, Clone)]
pub struct UserEvent {
    pub user_id: i64,
    pub notification: LiveNotification,
}

/// WebSocket server state
#[derive(Clone)]
pub struct WsState {
    /// Broadcast channel for per-user events
    pub tx: broadcast::Sender<UserEvent>,
    /// Connected clients registry
    pub clients: Arc<RwLock<HashMap<String, ClientInfo>>>,
}

/// Client connection information
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub client_id: String,
    pub user_id: i64,
}

/// Client message types
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ClientMessage {
    Ping,
}

/// Server message types
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ServerMessage {
    Connected { user_id: i64, unread: i64 },
    Notification { notification: LiveNotification },
    Pong,
}

#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: Option<String>,
}

impl Default for WsState {
    fn default() -> Self {
        Self::new()
    }
}

impl WsState {
    /// Create new WebSocket state
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(256);
        Self {
            tx,
            clients: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Push a notification to every open connection of `user_id`
    ///
    /// Delivery is best-effort; having nobody connected is not an error.
    pub fn push(&self, user_id: i64, notification: LiveNotification) {
        if self
            .tx
            .send(UserEvent {
                user_id,
                notification,
            })
            .is_err()
        {
            tracing::debug!(user_id, "No live listeners for notification");
        }
    }

    /// Number of open connections for a user
    pub async fn connections_for(&self, user_id: i64) -> usize {
        self.clients
            .read()
            .await
            .values()
            .filter(|c| c.user_id == user_id)
            .count()
    }

    async fn register_client(&self, client_id: String, user_id: i64) {
        let mut clients = self.clients.write().await;
        clients.insert(
            client_id.clone(),
            ClientInfo {
                client_id,
                user_id,
            },
        );
    }

    async fn unregister_client(&self, client_id: &str) {
        let mut clients = self.clients.write().await;
        clients.remove(client_id);
        tracing::info!("Client {} disconnected", client_id);
    }
}

/// WebSocket handler - authenticates, then upgrades the connection
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsAuthQuery>,
    State(authenticator): State<Arc<Authenticator>>,
    State(notifications): State<Arc<NotificationService>>,
    State(state): State<WsState>,
) -> Response {
    let Some(token) = query.token.filter(|t| !t.is_empty()) else {
        return unauthorized("MISSING_TOKEN", "token query parameter required");
    };

    let user = match authenticator.authenticate(&token).await {
        Ok(user) => user,
        Err(e) => {
            tracing::debug!("Rejected websocket connection: {}", e);
            return unauthorized("INVALID_TOKEN", "Invalid or expired token");
        }
    };

    let unread = notifications.unread_count(user.id).await.unwrap_or_else(|e| {
        tracing::warn!(user_id = user.id, "Failed to count unread notifications: {}", e);
        0
    });

    ws.on_upgrade(move |socket| handle_socket(socket, state, user.id, unread))
}

fn unauthorized(code: &str, message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": { "code": code, "message": message } })),
    )
        .into_response()
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, state: WsState, user_id: i64, unread: i64) {
    let client_id = Uuid::new_v4().to_string();
    state.register_client(client_id.clone(), user_id).await;
    let connections = state.connections_for(user_id).await;
    tracing::info!(
        user_id,
        connections,
        "Client {} connected",
        client_id
    );

    let (mut sender, mut receiver) = socket.split();
    let (internal_tx, mut internal_rx) = mpsc::channel::<ServerMessage>(32);
    let _ = internal_tx.send(ServerMessage::Connected { user_id, unread }).await;

    let mut rx = state.tx.subscribe();

    let mut send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                event = rx.recv() => {
                    let event = match event {
                        Ok(event) => event,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(user_id, skipped, "Live channel lagged");
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    };
                    if event.user_id != user_id {
                        continue;
                    }
                    let msg = ServerMessage::Notification { notification: event.notification };
                    if let Ok(text) = serde_json::to_string(&msg) {
                        if sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                }
                Some(msg) = internal_rx.recv() => {
                    if let Ok(text) = serde_json::to_string(&msg) {
                        if sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                }
                else => break,
            }
        }
    });

    let client_id_recv = client_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if let Ok(ClientMessage::Ping) = serde_json::from_str::<ClientMessage>(&text) {
                        tracing::debug!("Ping from client {}", client_id_recv);
                        let _ = internal_tx.send(ServerMessage::Pong).await;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    state.unregister_client(&client_id).await;
}
