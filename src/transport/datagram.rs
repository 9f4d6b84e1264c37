//! Unix datagram socket pair channel
//!
//! The server half ([`DatagramChannel`]) is non-blocking and implements
//! [`InputChannel`]; the client half ([`ClientEndpoint`]) blocks with an
//! optional read timeout and is what a client process (or the loopback
//! driver) reads events from and writes finished signals to.

use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};
use std::os::unix::net::UnixDatagram;
use std::time::Duration;

use tracing::{trace, warn};

use super::wire::{FinishedSignal, MotionPayload, WireMessage};
use crate::input::{
    Acknowledgement, ChannelId, InputChannel, KeyEvent, PointerEvent, PublishError, TouchEvent,
    MAX_TOUCH_POINTS,
};

/// Largest event datagram the client will read
pub const MAX_DATAGRAM_SIZE: usize = 64 * 1024;

/// Largest finished signal the server will read; longer datagrams are
/// truncated and fail to decode
pub const MAX_FINISHED_SIGNAL_SIZE: usize = 256;

/// Server half of a datagram socket pair
pub struct DatagramChannel {
    id: ChannelId,
    socket: UnixDatagram,
}

impl DatagramChannel {
    /// Create a connected pair; the channel id is the server socket's fd
    pub fn pair() -> io::Result<(DatagramChannel, ClientEndpoint)> {
        let (server, client) = UnixDatagram::pair()?;
        server.set_nonblocking(true)?;
        let id = ChannelId::new(server.as_raw_fd());
        trace!(channel = %id, "Created datagram channel");

        Ok((
            DatagramChannel { id, socket: server },
            ClientEndpoint { socket: client },
        ))
    }

    fn send(&self, message: &WireMessage) -> Result<(), PublishError> {
        let bytes = serde_json::to_vec(message)
            .map_err(|e| PublishError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        self.socket
            .send(&bytes)
            .map(|_| ())
            .map_err(PublishError::from_io)
    }
}

impl InputChannel for DatagramChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn readiness_fd(&self) -> BorrowedFd<'_> {
        self.socket.as_fd()
    }

    fn publish_key(&self, sequence_id: u32, event: &KeyEvent) -> Result<(), PublishError> {
        self.send(&WireMessage::Key {
            sequence_id,
            event: event.clone(),
        })
    }

    fn publish_touch(&self, sequence_id: u32, event: &TouchEvent) -> Result<(), PublishError> {
        if event.points.is_empty() || event.points.len() > MAX_TOUCH_POINTS {
            return Err(PublishError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("touch event with {} points", event.points.len()),
            )));
        }
        self.send(&WireMessage::Motion {
            sequence_id,
            event: MotionPayload::Touch(event.clone()),
        })
    }

    fn publish_pointer(&self, sequence_id: u32, event: &PointerEvent) -> Result<(), PublishError> {
        self.send(&WireMessage::Motion {
            sequence_id,
            event: MotionPayload::Pointer(event.clone()),
        })
    }

    fn receive_ack(&self) -> io::Result<Option<Acknowledgement>> {
        let mut buf = [0u8; MAX_FINISHED_SIGNAL_SIZE];
        let len = loop {
            match self.socket.recv(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(len) => break len,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };

        match serde_json::from_slice::<FinishedSignal>(&buf[..len]) {
            Ok(signal) => Ok(Some(signal.into())),
            Err(e) => {
                warn!(channel = %self.id, len, error = %e, "Discarding malformed finished signal");
                Err(io::Error::new(io::ErrorKind::InvalidData, e))
            }
        }
    }
}

/// Client half of a datagram socket pair
pub struct ClientEndpoint {
    socket: UnixDatagram,
}

impl ClientEndpoint {
    /// Limit how long [`recv_message`](Self::recv_message) waits; `None` waits forever
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.socket.set_read_timeout(timeout)
    }

    /// Next message from the server, `Ok(None)` on timeout
    pub fn recv_message(&self) -> io::Result<Option<WireMessage>> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let len = match self.socket.recv(&mut buf) {
            Ok(len) => len,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) =>
            {
                return Ok(None)
            }
            Err(e) => return Err(e),
        };

        serde_json::from_slice(&buf[..len])
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Acknowledge the message published as `sequence_id`
    pub fn send_finished(&self, sequence_id: u32, handled: bool) -> io::Result<()> {
        let bytes = serde_json::to_vec(&FinishedSignal {
            sequence_id,
            handled,
        })
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.socket.send(&bytes).map(|_| ())
    }

    /// Send raw bytes to the server, bypassing the wire format
    pub fn send_raw(&self, bytes: &[u8]) -> io::Result<()> {
        self.socket.send(bytes).map(|_| ())
    }
}

impl AsFd for ClientEndpoint {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.socket.as_fd()
    }
}
