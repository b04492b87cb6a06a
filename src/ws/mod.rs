use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::models::template_event;
use crate::registry::{LoadSummary, SourceFailure};

/// WebSocket event message
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: &'static str,
    pub payload: serde_json::Value,
}

/// Payload for a committed reload
#[derive(Debug, Clone, Serialize)]
pub struct ReloadedPayload {
    pub loaded: usize,
    pub generation: u64,
}

/// Payload for a rejected reload
#[derive(Debug, Clone, Serialize)]
pub struct ReloadFailedPayload {
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<SourceFailure>,
}

/// WebSocket hub manages connections and broadcasts registry events
pub struct Hub {
    tx: broadcast::Sender<String>,
    client_count: Arc<RwLock<usize>>,
}

impl Hub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            tx,
            client_count: Arc::new(RwLock::new(0)),
        }
    }

    /// Broadcast an event to all connected clients
    pub async fn broadcast_event(&self, event: Event) {
        let data = match serde_json::to_string(&event) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!("Error serializing WebSocket event: {}", e);
                return;
            }
        };

        let count = *self.client_count.read().await;
        if count > 0 {
            if let Err(e) = self.tx.send(data) {
                tracing::warn!("Error broadcasting WebSocket event: {}", e);
            } else {
                tracing::debug!("Broadcasting {} to {} clients", event.event_type, count);
            }
        }
    }

    /// Broadcast that a new template snapshot is being served
    pub async fn broadcast_reloaded(&self, summary: &LoadSummary) {
        self.broadcast_event(Event {
            event_type: template_event::RELOADED,
            payload: serde_json::to_value(ReloadedPayload {
                loaded: summary.loaded,
                generation: summary.generation,
            })
            .unwrap_or_default(),
        })
        .await;
    }

    /// Broadcast that a reload was rejected and the old templates remain
    pub async fn broadcast_reload_failed(&self, message: &str, failures: &[SourceFailure]) {
        self.broadcast_event(Event {
            event_type: template_event::RELOAD_FAILED,
            payload: serde_json::to_value(ReloadFailedPayload {
                message: message.to_string(),
                failures: failures.to_vec(),
            })
            .unwrap_or_default(),
        })
        .await;
    }

    /// Get the number of connected clients
    pub async fn client_count(&self) -> usize {
        *self.client_count.read().await
    }

    /// Subscribe to events
    fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    async fn increment_clients(&self) {
        let mut count = self.client_count.write().await;
        *count += 1;
        tracing::info!("WebSocket client connected. Total clients: {}", *count);
    }

    async fn decrement_clients(&self) {
        let mut count = self.client_count.write().await;
        *count = count.saturating_sub(1);
        tracing::info!("WebSocket client disconnected. Total clients: {}", *count);
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

/// WebSocket handler for axum
pub async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<Arc<Hub>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(socket: WebSocket, hub: Arc<Hub>) {
    let (mut sender, mut receiver) = socket.split();

    hub.increment_clients().await;
    let mut rx = hub.subscribe();

    let send_task = tokio::spawn(async move {
        while let Ok(msg) = rx.recv().await {
            if sender.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    // Drain client messages only to notice disconnects
    let recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            if msg.is_err() {
                break;
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    hub.decrement_clients().await;
}
