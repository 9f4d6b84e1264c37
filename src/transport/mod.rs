//! Reference transport
//!
//! A [`DatagramChannel`] is the server end of a Unix datagram socket pair
//! carrying JSON encoded events one per datagram. It exists so the delivery
//! subsystem can be exercised end to end; compositors plug in their own
//! [`InputChannel`](crate::input::InputChannel).
//!
//! Error mapping on publish:
//!
//! | errno                                   | result                   |
//! |-----------------------------------------|--------------------------|
//! | `EAGAIN`                                | `PublishError::WouldBlock` |
//! | `EPIPE`, `ECONNREFUSED`, `ECONNRESET`   | `PublishError::PeerGone` |
//! | anything else                           | `PublishError::Io`       |

pub mod datagram;
pub mod wire;

pub use datagram::{ClientEndpoint, DatagramChannel, MAX_DATAGRAM_SIZE, MAX_FINISHED_SIGNAL_SIZE};
pub use wire::{FinishedSignal, MotionPayload, WireMessage};
