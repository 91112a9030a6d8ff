//! services/api/src/web/hub.rs
//!
//! The server's status mirror and the broadcast fan-out to every connected
//! status channel.

use crate::web::protocol::{DoorEvent, ServerMessage};
use doorlock_core::domain::DoorStatus;
use doorlock_core::status::{StatusMirror, StatusUpdate};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

/// Messages buffered per subscriber before it starts lagging.
const CHANNEL_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct StatusHub {
    mirror: Arc<RwLock<StatusMirror>>,
    tx: broadcast::Sender<ServerMessage>,
}

impl StatusHub {
    pub fn new(initial: DoorStatus) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            mirror: Arc::new(RwLock::new(StatusMirror::new(initial))),
            tx,
        }
    }

    pub fn snapshot(&self) -> DoorStatus {
        match self.mirror.read() {
            Ok(mirror) => mirror.status().clone(),
            Err(poisoned) => poisoned.into_inner().status().clone(),
        }
    }

    /// Feeds the mirror and pushes a snapshot to subscribers when the state changed.
    pub fn apply(&self, update: StatusUpdate) -> bool {
        let (changed, status) = {
            let mut mirror = match self.mirror.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let changed = mirror.apply(update);
            (changed, mirror.status().clone())
        };
        if changed {
            let _ = self.tx.send(ServerMessage::status(&status));
        }
        changed
    }

    pub fn announce(&self, event: DoorEvent) {
        // No subscribers is not an error.
        let _ = self.tx.send(ServerMessage::event(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.tx.subscribe()
    }
}

impl Default for StatusHub {
    fn default() -> Self {
        Self::new(DoorStatus::default())
    }
}
