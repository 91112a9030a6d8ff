//! services/api/src/web/protocol.rs
//!
//! Defines the status channel message protocol between clients (dashboard,
//! kiosk) and the API server. The same frames are spoken by the actuator's own
//! status socket, which the server follows upstream.

use doorlock_core::domain::{DoorStatus, LockAction, StatusSnapshot};
use doorlock_core::status::StatusUpdate;
use serde::{Deserialize, Deserializer, Serialize};

//=========================================================================================
// Messages Sent FROM the Client TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Requests an immediate status snapshot.
    GetStatus,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client
//=========================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DoorEvent {
    Doorbell,
    Unlock,
    Lock,
}

impl From<LockAction> for DoorEvent {
    fn from(action: LockAction) -> Self {
        match action {
            LockAction::Lock => DoorEvent::Lock,
            LockAction::Unlock => DoorEvent::Unlock,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventFrame {
    pub event: DoorEvent,
}

/// A full state report. `null` fields mean the value is unknown.
///
/// A frame must carry at least one state key and nothing else, so unknown
/// events and stray objects fail to parse instead of reading as a blank report.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(try_from = "RawStatusFrame")]
pub struct StatusFrame {
    pub locked: Option<bool>,
    pub door_open: Option<bool>,
    pub homekit_connected: bool,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStatusFrame {
    #[serde(default, deserialize_with = "present")]
    locked: Option<Option<bool>>,
    #[serde(default, deserialize_with = "present")]
    door_open: Option<Option<bool>>,
    homekit_connected: Option<bool>,
}

// Distinguishes an explicit `null` from a missing key.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Option<bool>>, D::Error> {
    Option::<bool>::deserialize(deserializer).map(Some)
}

impl TryFrom<RawStatusFrame> for StatusFrame {
    type Error = &'static str;

    fn try_from(raw: RawStatusFrame) -> Result<Self, Self::Error> {
        if raw.locked.is_none() && raw.door_open.is_none() && raw.homekit_connected.is_none() {
            return Err("status frame carries no state keys");
        }
        Ok(Self {
            locked: raw.locked.flatten(),
            door_open: raw.door_open.flatten(),
            homekit_connected: raw.homekit_connected.unwrap_or(false),
        })
    }
}

impl From<&DoorStatus> for StatusFrame {
    fn from(status: &DoorStatus) -> Self {
        Self {
            locked: Some(status.locked),
            door_open: Some(status.door_open),
            homekit_connected: status.homekit_paired,
        }
    }
}

impl From<StatusFrame> for StatusSnapshot {
    fn from(frame: StatusFrame) -> Self {
        Self {
            locked: frame.locked,
            door_open: frame.door_open,
            homekit_paired: frame.homekit_connected,
        }
    }
}

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(untagged)]
pub enum ServerMessage {
    // Events are tried first.
    Event(EventFrame),
    Status(StatusFrame),
}

impl ServerMessage {
    pub fn event(event: DoorEvent) -> Self {
        ServerMessage::Event(EventFrame { event })
    }

    pub fn status(status: &DoorStatus) -> Self {
        ServerMessage::Status(status.into())
    }

    pub fn as_event(&self) -> Option<DoorEvent> {
        match self {
            ServerMessage::Event(frame) => Some(frame.event),
            ServerMessage::Status(_) => None,
        }
    }

    /// The mirror update this message implies, if any. Doorbell events carry none.
    pub fn status_update(&self) -> Option<StatusUpdate> {
        match self {
            ServerMessage::Status(frame) => Some(StatusUpdate::Snapshot((*frame).into())),
            ServerMessage::Event(EventFrame {
                event: DoorEvent::Lock,
            }) => Some(StatusUpdate::Actuated(LockAction::Lock)),
            ServerMessage::Event(EventFrame {
                event: DoorEvent::Unlock,
            }) => Some(StatusUpdate::Actuated(LockAction::Unlock)),
            ServerMessage::Event(EventFrame {
                event: DoorEvent::Doorbell,
            }) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_actuator_frames() {
        let status: ServerMessage = serde_json::from_str(
            r#"{"homekit_connected": false, "locked": null, "door_open": null}"#,
        )
        .unwrap();
        assert_eq!(
            status,
            ServerMessage::Status(StatusFrame {
                locked: None,
                door_open: None,
                homekit_connected: false,
            })
        );

        let bell: ServerMessage = serde_json::from_str(r#"{"event": "doorbell"}"#).unwrap();
        assert_eq!(bell, ServerMessage::event(DoorEvent::Doorbell));
        assert_eq!(bell.status_update(), None);
    }

    #[test]
    fn unrecognised_frames_do_not_parse() {
        for raw in [
            r#"{"event": "motion"}"#,
            r#"{}"#,
            r#"{"status": "ok"}"#,
            r#"{"locked": true, "battery": 80}"#,
        ] {
            assert!(
                serde_json::from_str::<ServerMessage>(raw).is_err(),
                "{} should be rejected",
                raw
            );
        }
    }

    #[test]
    fn partial_status_frames_keep_the_keys_they_carry() {
        let frame: ServerMessage = serde_json::from_str(r#"{"locked": false}"#).unwrap();
        assert_eq!(
            frame,
            ServerMessage::Status(StatusFrame {
                locked: Some(false),
                door_open: None,
                homekit_connected: false,
            })
        );

        let paired: ServerMessage =
            serde_json::from_str(r#"{"homekit_connected": true}"#).unwrap();
        assert_eq!(
            paired.status_update(),
            Some(StatusUpdate::Snapshot(StatusSnapshot {
                locked: None,
                door_open: None,
                homekit_paired: true,
            }))
        );
    }

    #[test]
    fn encodes_frames_in_the_published_shape() {
        let json = serde_json::to_value(ServerMessage::event(DoorEvent::Unlock)).unwrap();
        assert_eq!(json, serde_json::json!({ "event": "unlock" }));

        let request: ClientMessage = serde_json::from_str(r#"{"action":"get_status"}"#).unwrap();
        assert_eq!(request, ClientMessage::GetStatus);
    }
}
