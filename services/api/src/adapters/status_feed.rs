//! services/api/src/adapters/status_feed.rs
//!
//! Follows a remote status socket and forwards every recognised frame to a
//! channel. Dropped connections are retried with jittered exponential backoff
//! until the cancellation token fires or the receiving side goes away.

use crate::web::middleware::SESSION_COOKIE;
use crate::web::protocol::{ClientMessage, ServerMessage};
use doorlock_core::backoff::Backoff;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{
    client::IntoClientRequest,
    http::{header::COOKIE, HeaderValue},
    Message as WsMessage,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Produces the session token to present on each (re)connect.
pub type TokenSource = Arc<dyn Fn() -> Option<String> + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("websocket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("invalid cookie header: {0}")]
    Header(#[from] tokio_tungstenite::tungstenite::http::header::InvalidHeaderValue),
    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Runs until `cancel` fires or `tx` is closed.
pub async fn run_status_feed(
    url: String,
    token: TokenSource,
    cancel: CancellationToken,
    tx: mpsc::UnboundedSender<ServerMessage>,
) {
    let mut backoff = Backoff::default();

    loop {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => break,
            outcome = follow(&url, token(), &tx, &mut backoff) => outcome,
        };
        match outcome {
            Ok(()) => info!(%url, "Status feed closed"),
            Err(e) => warn!(%url, "Status feed failed: {}", e),
        }
        if tx.is_closed() {
            break;
        }

        let delay = backoff.next_delay(&mut rand::thread_rng());
        debug!(?delay, "Reconnecting status feed");
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    info!("Status feed stopped");
}

/// One connection's lifetime.
async fn follow(
    url: &str,
    token: Option<String>,
    tx: &mpsc::UnboundedSender<ServerMessage>,
    backoff: &mut Backoff,
) -> Result<(), FeedError> {
    let mut request = url.into_client_request()?;
    if let Some(token) = token {
        let cookie = HeaderValue::from_str(&format!("{}={}", SESSION_COOKIE, token))?;
        request.headers_mut().insert(COOKIE, cookie);
    }

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request).await?;
    info!(%url, "Status feed connected");
    backoff.reset();

    let (mut sender, mut receiver) = ws_stream.split();
    let hello = serde_json::to_string(&ClientMessage::GetStatus)?;
    sender.send(WsMessage::Text(hello.into())).await?;

    while let Some(frame) = receiver.next().await {
        match frame? {
            WsMessage::Text(text) => match serde_json::from_str::<ServerMessage>(&text) {
                Ok(msg) => {
                    if tx.send(msg).is_err() {
                        return Ok(());
                    }
                }
                Err(e) => debug!("Ignoring unrecognised status frame: {}", e),
            },
            WsMessage::Close(_) => break,
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::protocol::DoorEvent;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn forwards_frames_and_requests_status_on_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            let first = ws.next().await.unwrap().unwrap();
            assert_eq!(first.into_text().unwrap().as_str(), r#"{"action":"get_status"}"#);

            let status = r#"{"locked":false,"door_open":null,"homekit_connected":false}"#;
            ws.send(WsMessage::Text(status.into())).await.unwrap();
            ws.send(WsMessage::Text("not json".into())).await.unwrap();
            ws.send(WsMessage::Text(r#"{"event":"doorbell"}"#.into()))
                .await
                .unwrap();
            // Keep the socket open until the client goes away.
            while ws.next().await.is_some() {}
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let feed = tokio::spawn(run_status_feed(
            format!("ws://{}/ws/status", addr),
            Arc::new(|| Some("abc".to_string())),
            cancel.clone(),
            tx,
        ));

        match rx.recv().await.unwrap() {
            ServerMessage::Status(frame) => {
                assert_eq!(frame.locked, Some(false));
                assert_eq!(frame.door_open, None);
            }
            other => panic!("expected status, got {:?}", other),
        }
        assert_eq!(
            rx.recv().await.unwrap(),
            ServerMessage::event(DoorEvent::Doorbell)
        );

        cancel.cancel();
        feed.await.unwrap();
        server.abort();
    }
}
