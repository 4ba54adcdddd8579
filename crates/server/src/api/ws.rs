//! WebSocket stream of task updates.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use sideload_core::{TaskEvent, TaskState};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_LAG_EVENTS, WS_MESSAGES_SENT};
use crate::state::AppState;

/// Interval between heartbeats on an idle connection.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// WebSocket message sent to clients for real-time updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// A task was created or changed.
    TaskUpdate {
        item_id: String,
        task_id: String,
        state: TaskState,
        progress_percent: Option<u8>,
        bytes_received: u64,
        bytes_total: Option<u64>,
    },
    /// A task left the registry.
    TaskRemoved { item_id: String, task_id: String },
    /// Server heartbeat (sent periodically to keep connection alive).
    Heartbeat { timestamp: i64 },
}

impl WsMessage {
    fn kind(&self) -> &'static str {
        match self {
            WsMessage::TaskUpdate { .. } => "task_update",
            WsMessage::TaskRemoved { .. } => "task_removed",
            WsMessage::Heartbeat { .. } => "heartbeat",
        }
    }
}

impl From<TaskEvent> for WsMessage {
    fn from(event: TaskEvent) -> Self {
        match event {
            TaskEvent::Updated {
                item_id,
                task_id,
                state,
                progress_percent,
                bytes_received,
                bytes_total,
            } => WsMessage::TaskUpdate {
                item_id,
                task_id,
                state,
                progress_percent,
                bytes_received,
                bytes_total,
            },
            TaskEvent::Removed { item_id, task_id } => WsMessage::TaskRemoved { item_id, task_id },
        }
    }
}

/// Query parameters for the WebSocket endpoint
#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    /// Only stream updates for this item.
    pub item_id: Option<String>,
}

impl WsParams {
    fn wants(&self, event: &TaskEvent) -> bool {
        self.item_id
            .as_deref()
            .is_none_or(|item_id| item_id == event.item_id())
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state, params))
}

async fn send_message(sender: &mut SplitSink<WebSocket, Message>, msg: WsMessage) -> bool {
    WS_MESSAGES_SENT.with_label_values(&[msg.kind()]).inc();
    match serde_json::to_string(&msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            error!("Failed to serialize WsMessage: {}", e);
            true
        }
    }
}

/// Handle a single WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, params: WsParams) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before the snapshot so nothing falls in between
    let mut rx = state.registry().subscribe();
    let snapshot = state.registry().query_all().await;

    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();

    info!("WebSocket client connected");

    let send_task = tokio::spawn(async move {
        for task in snapshot {
            let event = task.to_event();
            if params.wants(&event) && !send_message(&mut sender, event.into()).await {
                return;
            }
        }

        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Ok(event) => {
                            if !params.wants(&event) {
                                continue;
                            }
                            if !send_message(&mut sender, event.into()).await {
                                debug!("WebSocket send failed, client disconnected");
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            // Progress is cumulative, so the next update carries the latest state.
                            warn!("WebSocket client lagged, skipped {} messages", n);
                            WS_LAG_EVENTS.inc();
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            debug!("Task update channel closed");
                            break;
                        }
                    }
                }
                _ = heartbeat.tick() => {
                    let msg = WsMessage::Heartbeat {
                        timestamp: chrono::Utc::now().timestamp(),
                    };
                    if !send_message(&mut sender, msg).await {
                        break;
                    }
                }
            }
        }
    });

    // Handle incoming messages from client (ping/pong, close)
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => {
                debug!("WebSocket client requested close");
                break;
            }
            Ok(Message::Text(text)) => {
                debug!("Received text message: {}", text);
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    send_task.abort();
    WS_CONNECTIONS_ACTIVE.dec();
    info!("WebSocket client disconnected");
}
