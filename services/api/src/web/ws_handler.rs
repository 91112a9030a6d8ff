//! services/api/src/web/ws_handler.rs
//!
//! The status channel. Each connection receives every broadcast from the
//! status hub and may ask for a snapshot at any time. The socket is closed
//! when the session that opened it expires.

use crate::web::{
    protocol::{ClientMessage, ServerMessage},
    state::{AppState, Session},
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use chrono::Utc;
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, session))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, session: Session) {
    info!("Status channel opened for {}", session.claims.surname);

    let (mut sender, mut receiver) = socket.split();
    let mut updates = app_state.hub.subscribe();

    let remaining = (session.claims.exp - Utc::now().timestamp()).max(0) as u64;
    let expiry = tokio::time::sleep(Duration::from_secs(remaining));
    tokio::pin!(expiry);

    // Every client starts from the current state.
    let initial = ServerMessage::status(&app_state.hub.snapshot());
    if send(&mut sender, &initial).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::GetStatus) => {
                                let msg = ServerMessage::status(&app_state.hub.snapshot());
                                if send(&mut sender, &msg).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Failed to deserialize client message: {}", e),
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client sent close message.");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Status channel read failed: {}", e);
                        break;
                    }
                    None => {
                        info!("Client disconnected.");
                        break;
                    }
                }
            }
            update = updates.recv() => {
                match update {
                    Ok(msg) => {
                        if send(&mut sender, &msg).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Status channel lagged, {} messages skipped", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            _ = &mut expiry => {
                info!("Session expired, closing status channel.");
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        }
    }

    info!("Status channel closed.");
}

async fn send(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to encode status message: {}", e);
            return Ok(());
        }
    };
    sender.send(Message::Text(json.into())).await
}
