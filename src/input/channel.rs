//! Transport channel boundary
//!
//! The delivery subsystem does not own sockets or wire formats. It talks to
//! one [`InputChannel`] per surface: publish a sequenced event, read back
//! finished signals, and expose a pollable fd so the main loop can tell us
//! when finished signals are waiting.

use std::fmt;
use std::os::fd::BorrowedFd;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::event::{KeyEvent, PointerEvent, TouchEvent};

/// Identifier of a channel (its server-side fd)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(i32);

impl ChannelId {
    /// Wrap a raw channel identifier
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// Raw identifier
    pub const fn raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fd:{}", self.0)
    }
}

/// Client's answer to a published event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgement {
    /// Sequence id of the published event
    pub sequence_id: u32,
    /// Whether the client consumed the event
    pub handled: bool,
}

/// Classified publish failure
#[derive(Error, Debug)]
pub enum PublishError {
    /// The channel is full, the client is not reading
    #[error("channel would block")]
    WouldBlock,

    /// The client end has gone away
    #[error("peer is gone")]
    PeerGone,

    /// Anything else
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

impl PublishError {
    /// Classify an io error returned by a non-blocking socket write
    pub fn from_io(error: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match error.kind() {
            ErrorKind::WouldBlock => PublishError::WouldBlock,
            ErrorKind::BrokenPipe
            | ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::NotConnected => PublishError::PeerGone,
            _ => PublishError::Io(error),
        }
    }
}

/// Per-surface transport endpoint
///
/// Publishing must never block: back-pressure is reported as
/// [`PublishError::WouldBlock`].
pub trait InputChannel: Send + Sync {
    /// Identifier, unique among live channels
    fn id(&self) -> ChannelId;

    /// Fd that becomes readable when finished signals are waiting
    fn readiness_fd(&self) -> BorrowedFd<'_>;

    /// Publish a key event
    fn publish_key(&self, sequence_id: u32, event: &KeyEvent) -> Result<(), PublishError>;

    /// Publish a touch event (motion encoding)
    fn publish_touch(&self, sequence_id: u32, event: &TouchEvent) -> Result<(), PublishError>;

    /// Publish a pointer event (motion encoding)
    fn publish_pointer(&self, sequence_id: u32, event: &PointerEvent)
        -> Result<(), PublishError>;

    /// Read one finished signal, `Ok(None)` when none are waiting
    ///
    /// Each call consumes at most one message. A message that cannot be
    /// decoded is consumed and reported as [`ErrorKind::InvalidData`](std::io::ErrorKind::InvalidData),
    /// so callers can bound how much work one readiness callback does.
    fn receive_ack(&self) -> std::io::Result<Option<Acknowledgement>>;
}
