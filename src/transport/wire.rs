//! Wire format of the datagram transport
//!
//! One JSON document per datagram. Server to client carries a
//! [`WireMessage`]; client to server carries a [`FinishedSignal`].

use serde::{Deserialize, Serialize};

use crate::input::{Acknowledgement, InputEvent, KeyEvent, PointerEvent, TouchEvent};

/// Motion payload: touch or pointer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum MotionPayload {
    /// Touch screen contact points
    Touch(TouchEvent),
    /// Pointer device
    Pointer(PointerEvent),
}

/// Server to client message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    /// Key event
    Key {
        /// Echoed back in the finished signal
        sequence_id: u32,
        /// Event payload
        event: KeyEvent,
    },
    /// Touch or pointer event
    Motion {
        /// Echoed back in the finished signal
        sequence_id: u32,
        /// Event payload
        event: MotionPayload,
    },
}

impl WireMessage {
    /// Sequence id the message was published with
    pub fn sequence_id(&self) -> u32 {
        match self {
            WireMessage::Key { sequence_id, .. } | WireMessage::Motion { sequence_id, .. } => {
                *sequence_id
            }
        }
    }

    /// Rebuild the event the message carries
    pub fn into_event(self) -> InputEvent {
        match self {
            WireMessage::Key { event, .. } => InputEvent::Key(event),
            WireMessage::Motion {
                event: MotionPayload::Touch(event),
                ..
            } => InputEvent::Touch(event),
            WireMessage::Motion {
                event: MotionPayload::Pointer(event),
                ..
            } => InputEvent::Pointer(event),
        }
    }
}

/// Client to server acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishedSignal {
    /// Sequence id of the acknowledged message
    pub sequence_id: u32,
    /// Whether the client consumed the event
    pub handled: bool,
}

impl From<FinishedSignal> for Acknowledgement {
    fn from(signal: FinishedSignal) -> Self {
        Acknowledgement {
            sequence_id: signal.sequence_id,
            handled: signal.handled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{EventKind, KeyAction};

    #[test]
    fn test_message_is_tagged() {
        let message = WireMessage::Key {
            sequence_id: 7,
            event: match InputEvent::key(KeyAction::Down, 30, 0x1E, 5) {
                InputEvent::Key(key) => key,
                _ => unreachable!(),
            },
        };

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "key");
        assert_eq!(json["sequence_id"], 7);

        let decoded: WireMessage = serde_json::from_value(json).unwrap();
        assert_eq!(decoded.sequence_id(), 7);
        assert_eq!(decoded.into_event().kind(), EventKind::Key);
    }

    #[test]
    fn test_motion_payload_keeps_source() {
        let event = InputEvent::pointer_motion(3.0, 4.0, 9);
        let InputEvent::Pointer(pointer) = event.clone() else {
            unreachable!()
        };
        let message = WireMessage::Motion {
            sequence_id: 1,
            event: MotionPayload::Pointer(pointer),
        };

        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains("\"source\":\"pointer\""));
        let decoded: WireMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.into_event(), event);
    }

    #[test]
    fn test_finished_signal_rejects_garbage() {
        assert!(serde_json::from_str::<FinishedSignal>("{\"sequence_id\":1}").is_err());
        let signal: FinishedSignal =
            serde_json::from_str("{\"sequence_id\":1,\"handled\":true}").unwrap();
        assert_eq!(
            Acknowledgement::from(signal),
            Acknowledgement {
                sequence_id: 1,
                handled: true
            }
        );
    }
}
