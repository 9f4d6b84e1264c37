//! Reliable Input Event Delivery
//!
//! This module delivers server-generated input events (key, touch, pointer)
//! to client surfaces over per-surface transport channels, tracks each event
//! until the client acknowledges it, and reports every outcome to an observer.
//!
//! # Features
//!
//! - **Per-surface channels**
//!   - One transfer per surface input channel, created and destroyed as the
//!     scene reports surfaces coming and going
//!   - Channel fd reuse by a new surface replaces the stale transfer
//!
//! - **Non-blocking sends**
//!   - A full channel reports `client_blocked` and drops the event
//!   - A dead peer reports `send_failed(PeerGone)`
//!   - Only unclassified transport errors reach the caller
//!
//! - **Acknowledgement tracking**
//!   - Sequence ids are nonzero and distinct until the counter wraps
//!   - Acknowledgements may arrive out of order
//!   - One alarm per transfer covers the oldest outstanding event
//!   - Surface removal fails everything outstanding, newest first
//!
//! # Architecture
//!
//! ```text
//!   Scene thread                Producer thread              Main loop thread
//!        │                            │                             │
//!        ▼                            ▼                             │
//! ┌──────────────┐            ┌───────────────┐                     │
//! │ SceneWatcher │───────────>│  InputSender  │                     │
//! └──────────────┘  add/remove│ TransferTable │                     │
//!                             │ + Sequence    │                     │
//!                             └───────────────┘                     │
//!                                     │ send                        │
//!                                     ▼                             │
//!                             ┌───────────────┐  readiness / alarm  │
//!                             │   Transfer    │<────────────────────┘
//!                             │ pending FIFO  │
//!                             └───────────────┘
//!                                │         │
//!                   publish      ▼         ▼  outcomes
//!                         InputChannel   InputSendObserver
//! ```
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use lamco_input_sender::input::{
//!     ChannelId, DeliverySettings, InputEvent, InputSender, TracingReport,
//! };
//! use lamco_input_sender::main_loop::ThreadedMainLoop;
//! use lamco_input_sender::scene::BasicScene;
//!
//! # fn example() -> anyhow::Result<()> {
//! let scene = Arc::new(BasicScene::new());
//! let main_loop = Arc::new(ThreadedMainLoop::start()?);
//!
//! let sender = InputSender::new(
//!     scene,
//!     main_loop,
//!     None,
//!     Arc::new(TracingReport::new()),
//!     DeliverySettings::default(),
//! );
//!
//! sender.deliver(InputEvent::pointer_motion(10.0, 20.0, 0), ChannelId::new(7))?;
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! [`InputSender::deliver`] returns [`InputSendError::UnknownChannel`] when no
//! surface owns the channel and [`InputSendError::Transport`] for transport
//! failures that cannot be classified. Everything else is an outcome, not an
//! error, and goes to the [`InputSendObserver`].

pub mod channel;
pub mod error;
pub mod event;
pub mod observer;
pub mod sender;
pub mod sequence;
pub mod surface;
pub mod transfer;

mod scene_watcher;

#[cfg(test)]
pub(crate) mod testing;

pub use channel::{Acknowledgement, ChannelId, InputChannel, PublishError};
pub use error::{classify_error, ErrorType, InputSendError, Result};
pub use event::{
    EventKind, InputEvent, KeyAction, KeyEvent, Modifiers, PointerAction, PointerButtons,
    PointerEvent, ToolType, TouchAction, TouchEvent, TouchPoint, MAX_TOUCH_POINTS,
};
pub use observer::{
    Consumption, DeliveryReport, FailureReason, InputSendObserver, StatsObserver, TracingReport,
};
pub use sender::InputSender;
pub use sequence::SequenceAllocator;
pub use surface::{Scene, SceneObserver, Surface, SurfaceId};
pub use transfer::{
    DeliveryContext, DeliverySettings, PendingEntry, SendStatus, Transfer, TransferSignal,
    TransferState, DEFAULT_MAX_ACKS_PER_DRAIN, DEFAULT_RESPONSE_TIMEOUT,
};
