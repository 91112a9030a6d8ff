//! crates/doorlock_core/src/status.rs
//!
//! The cached door state and the single reducer that merges the two sources
//! writing to it: actuation acknowledgements (optimistic) and status pushes
//! from the actuator (confirmed).

use crate::domain::{DoorStatus, LockAction, StatusSnapshot};
use chrono::Utc;

/// An input to the status mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    /// A full report from the actuator. Always authoritative.
    Snapshot(StatusSnapshot),
    /// The actuator acknowledged a command; the physical state is not yet confirmed.
    Actuated(LockAction),
}

/// Local, possibly stale copy of the actuator's state.
///
/// Updates are applied in arrival order (last write wins). A snapshot clears
/// any pending optimistic action, so a later confirmation always overrides an
/// earlier acknowledgement.
#[derive(Debug, Clone)]
pub struct StatusMirror {
    status: DoorStatus,
    pending: Option<LockAction>,
}

impl StatusMirror {
    pub fn new(initial: DoorStatus) -> Self {
        Self {
            status: initial,
            pending: None,
        }
    }

    pub fn status(&self) -> &DoorStatus {
        &self.status
    }

    /// The optimistic action not yet confirmed by a snapshot, if any.
    pub fn pending(&self) -> Option<LockAction> {
        self.pending
    }

    /// Applies an update and reports whether the visible state changed.
    pub fn apply(&mut self, update: StatusUpdate) -> bool {
        let before = (
            self.status.locked,
            self.status.door_open,
            self.status.homekit_paired,
        );

        match update {
            StatusUpdate::Snapshot(snapshot) => {
                if let Some(locked) = snapshot.locked {
                    self.status.locked = locked;
                }
                if let Some(open) = snapshot.door_open {
                    self.status.door_open = open;
                }
                self.status.homekit_paired = snapshot.homekit_paired;
                self.pending = None;
            }
            StatusUpdate::Actuated(action) => {
                self.status.locked = action.leaves_locked();
                self.pending = Some(action);
            }
        }

        let after = (
            self.status.locked,
            self.status.door_open,
            self.status.homekit_paired,
        );
        let changed = before != after;
        if changed {
            self.status.last_updated = Utc::now();
        }
        changed
    }
}

impl Default for StatusMirror {
    fn default() -> Self {
        Self::new(DoorStatus::default())
    }
}
