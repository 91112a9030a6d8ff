//! services/api/src/bin/kiosk.rs
//!
//! The door unit. Runs one `DoorPanel` against the API server and reads
//! keypad input from stdin, one command per line:
//!
//!   press | release | <digits> | key <n> | del | cancel | bell | view | quit

use doorlock_api::{
    adapters::{
        panel_http::HttpPanelClient,
        status_feed::{run_status_feed, TokenSource},
    },
    config::KioskConfig,
    error::ApiError,
};
use doorlock_core::control::{DoorPanel, PanelConfig, PanelEvent, PanelHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Sessions last two hours; renew well before that.
const RELOGIN_INTERVAL: Duration = Duration::from_secs(90 * 60);

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = KioskConfig::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- 2. Log In ---
    let client = Arc::new(HttpPanelClient::new(
        config.api_url.clone(),
        config.surname.clone(),
        config.password.clone(),
        config.request_timeout,
    )?);
    client.login().await?;

    // --- 3. Start the Panel ---
    let (panel, panel_task) = DoorPanel::spawn(
        client.clone(),
        client.clone(),
        PanelConfig {
            settle_window: config.settle_window,
        },
    );
    let shutdown = CancellationToken::new();

    // --- 4. Follow the Server's Status Channel ---
    let (tx, mut rx) = mpsc::unbounded_channel();
    let token: TokenSource = {
        let client = client.clone();
        Arc::new(move || client.token())
    };
    tokio::spawn(run_status_feed(
        config.ws_url.clone(),
        token,
        shutdown.clone(),
        tx,
    ));
    {
        let panel = panel.clone();
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Some(update) = msg.status_update() {
                    panel.send(PanelEvent::Status(update));
                } else if msg.as_event().is_some() {
                    panel.send(PanelEvent::Doorbell);
                }
            }
        });
    }

    // --- 5. Keep the Session Fresh ---
    {
        let client = client.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(RELOGIN_INTERVAL);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        if let Err(e) = client.login().await {
                            warn!("Session renewal failed: {}", e);
                        }
                    }
                }
            }
        });
    }

    // --- 6. Report What the Panel Shows ---
    {
        let mut view = panel.subscribe();
        tokio::spawn(async move {
            let mut last_phase = view.borrow().phase;
            while view.changed().await.is_ok() {
                let current = view.borrow_and_update().clone();
                if current.phase != last_phase {
                    info!(phase = ?current.phase, locked = current.status.locked, "Panel phase");
                    last_phase = current.phase;
                }
                if let Some(notice) = &current.notice {
                    warn!("{}", notice);
                }
            }
        });
    }

    // --- 7. Read Keypad Input ---
    info!("Kiosk ready. Commands: press, release, <digits>, key <n>, del, cancel, bell, view, quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        if !handle_command(line.trim(), &panel, &client).await {
            break;
        }
    }

    // --- 8. Shut Down ---
    info!("Kiosk shutting down");
    shutdown.cancel();
    panel.shutdown();
    panel_task
        .await
        .map_err(|e| ApiError::Internal(format!("panel task failed: {}", e)))?;
    Ok(())
}

/// Returns `false` when the kiosk should exit.
async fn handle_command(command: &str, panel: &PanelHandle, client: &HttpPanelClient) -> bool {
    match command {
        "" => {}
        "quit" | "exit" => return false,
        "press" | "hold" => {
            panel.send(PanelEvent::Press);
        }
        "release" => {
            panel.send(PanelEvent::Release);
        }
        "del" => {
            panel.send(PanelEvent::Delete);
        }
        "cancel" => {
            panel.send(PanelEvent::Cancel);
        }
        "bell" => {
            if let Err(e) = client.trigger_doorbell().await {
                warn!("Doorbell failed: {}", e);
            }
        }
        "view" => {
            let view = panel.view();
            info!(
                phase = ?view.phase,
                progress = view.hold_progress,
                digits = view.entered_digits,
                keys = ?view.layout.keys(),
                ringing = view.ringing,
                locked = view.status.locked,
                "Panel view"
            );
        }
        other => {
            if let Some(index) = other.strip_prefix("key ") {
                match index.trim().parse::<usize>() {
                    Ok(index) => {
                        panel.send(PanelEvent::Key(index));
                    }
                    Err(_) => warn!("Unknown key '{}'", index),
                }
            } else if other.chars().all(|c| c.is_ascii_digit()) {
                for c in other.bytes() {
                    panel.send(PanelEvent::Digit(c - b'0'));
                }
            } else {
                warn!("Unknown command '{}'", other);
            }
        }
    }
    true
}
