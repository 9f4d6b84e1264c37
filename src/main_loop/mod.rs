//! Event loop boundary
//!
//! Transfers need two services from the compositor's event loop: "call me
//! when this fd is readable" and "call me after this long". Both callbacks run
//! on the loop's own thread.
//!
//! [`ThreadedMainLoop`] is a small poll(2) based implementation used by the
//! binary and the integration tests. A compositor embedding this crate would
//! normally adapt its own loop to [`MainLoop`] instead.

use std::os::fd::BorrowedFd;
use std::time::Duration;

use crate::input::ChannelId;

pub mod threaded;

pub use threaded::ThreadedMainLoop;

/// Callback run when a registered fd becomes readable
pub type FdHandler = Box<dyn Fn() + Send + Sync>;

/// Callback run when an alarm fires
pub type AlarmCallback = Box<dyn Fn() + Send + Sync>;

/// One-shot timer that can be re-armed
pub trait Alarm: Send + Sync {
    /// Arm (or re-arm) the alarm to fire once after `delay`
    fn reschedule_in(&self, delay: Duration);

    /// Disarm; returns whether the alarm was pending
    fn cancel(&self) -> bool;

    /// Whether the alarm is armed and has not fired yet
    fn is_pending(&self) -> bool;
}

/// Event loop services used by input delivery
pub trait MainLoop: Send + Sync {
    /// Call `handler` on the loop thread whenever `fd` is readable.
    /// `owner` identifies the registration for [`unregister_fd_handler`](Self::unregister_fd_handler).
    fn register_fd_handler(&self, fd: BorrowedFd<'_>, owner: ChannelId, handler: FdHandler);

    /// Drop the registration made for `owner`, if any
    fn unregister_fd_handler(&self, owner: ChannelId);

    /// Create a disarmed alarm that runs `callback` on the loop thread
    fn create_alarm(&self, callback: AlarmCallback) -> Box<dyn Alarm>;
}
