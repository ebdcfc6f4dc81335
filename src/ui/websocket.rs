//! WebSocket state push
//!
//! Each client gets the current channel snapshots on connect and again after
//! every state change. Clients may also send commands as JSON, using the
//! same shape as [`Command`].

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use super::handlers::invoke_blocking;
use crate::control::ChannelSnapshot;
use crate::engine::Command;
use crate::ui::server::AppState;

/// Messages pushed to clients
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Sources { sources: Vec<ChannelSnapshot> },
    Error { message: String },
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let client = Uuid::new_v4();
    tracing::info!("Control client {} connected", client);

    let (mut sender, mut receiver) = socket.split();
    let mut updates = state.updates.subscribe();

    let initial = state.snapshots.read().clone();
    if send(&mut sender, &ServerMessage::Sources { sources: initial }).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            update = updates.recv() => {
                let sources = match update {
                    Ok(sources) => sources,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("Client {} lagged by {} updates", client, skipped);
                        let latest = state.snapshots.read().clone();
                        latest
                    }
                    Err(RecvError::Closed) => break,
                };
                if send(&mut sender, &ServerMessage::Sources { sources }).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                };

                if let Some(reply) = handle_command(&state, &text).await {
                    if send(&mut sender, &reply).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    tracing::info!("Control client {} disconnected", client);
}

/// Run a client command; returns an error message to send back, if any
async fn handle_command(state: &AppState, text: &str) -> Option<ServerMessage> {
    let command: Command = match serde_json::from_str(text) {
        Ok(command) => command,
        Err(e) => {
            return Some(ServerMessage::Error {
                message: format!("Invalid command: {}", e),
            })
        }
    };

    match invoke_blocking(state, command).await {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(ServerMessage::Error { message: e.to_string() }),
        Err(e) => Some(ServerMessage::Error { message: e.to_string() }),
    }
}

async fn send(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("Failed to encode state push: {}", e);
            return Ok(());
        }
    };
    sender.send(Message::Text(text)).await
}
