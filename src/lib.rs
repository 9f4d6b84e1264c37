//! # lamco-input-sender
//!
//! Reliable input event delivery for a display server.
//!
//! The server produces key, touch and pointer events; this crate delivers
//! each one, in order, to the client surface it belongs to over that
//! surface's own non-blocking channel, tracks it until the client sends a
//! finished signal, and tells an observer how every event ended.
//!
//! # Architecture
//!
//! ```text
//! lamco-input-sender
//!   ├─> input      (InputSender, Transfer state machine, traits at the seams)
//!   ├─> main_loop  (fd readiness + alarms; ThreadedMainLoop reference impl)
//!   ├─> transport  (DatagramChannel reference impl, JSON wire format)
//!   ├─> scene      (BasicScene reference impl)
//!   ├─> config     (TOML configuration)
//!   ├─> loopback   (in-process demo driver)
//!   └─> utils      (metrics, user-facing error formatting)
//! ```
//!
//! # Data Flow
//!
//! **Lifecycle:** Scene → SceneWatcher → transfer table
//!
//! **Events:** Producer → InputSender → Transfer → InputChannel → Client
//!
//! **Outcomes:** Client → finished signal → MainLoop → Transfer → InputSendObserver

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Delivery configuration
pub mod config;

/// Input event delivery
pub mod input;

/// In-process loopback demo
pub mod loopback;

/// Event loop boundary and reference implementation
pub mod main_loop;

/// In-memory scene
pub mod scene;

/// Datagram socket transport
pub mod transport;

/// Utility functions
pub mod utils;
