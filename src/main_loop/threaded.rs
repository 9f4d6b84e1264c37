//! poll(2) based main loop on a dedicated thread
//!
//! ```text
//!   callers (any thread)               loop thread
//!   ─────────────────────              ──────────────────────────────
//!   register / unregister ──┐          ┌─> snapshot registrations
//!   reschedule / cancel  ───┼─ wake ──>│   poll(fds + wake socket, next alarm)
//!                           │          │   run ready fd handlers
//!                           │          │   run expired alarm callbacks
//!                           │          └── (no loop lock held in callbacks)
//! ```
//!
//! Registered fds are duplicated so the loop never polls a descriptor that
//! was closed under it. A registration whose fd reports hang-up or error gets
//! its handler called once more and is then dropped, so a dead peer cannot
//! make the loop spin.

use std::collections::HashMap;
use std::io;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::os::unix::net::UnixDatagram;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

use super::{Alarm, AlarmCallback, FdHandler, MainLoop};
use crate::input::ChannelId;

type SharedCallback = Arc<dyn Fn() + Send + Sync>;

struct Registration {
    owner: ChannelId,
    fd: OwnedFd,
    handler: SharedCallback,
}

struct AlarmEntry {
    due: Option<Instant>,
    callback: SharedCallback,
}

struct Shared {
    registrations: Mutex<HashMap<ChannelId, Arc<Registration>>>,
    alarms: Mutex<HashMap<u64, AlarmEntry>>,
    next_alarm_id: AtomicU64,
    running: AtomicBool,
    wake_tx: UnixDatagram,
    wake_rx: UnixDatagram,
}

impl Shared {
    fn wake(&self) {
        match self.wake_tx.send(&[0]) {
            Ok(_) => {}
            // Already a wake-up queued
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => warn!(error = %e, "Failed to wake main loop"),
        }
    }

    fn drain_wake(&self) {
        let mut buf = [0u8; 16];
        while self.wake_rx.recv(&mut buf).is_ok() {}
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.alarms.lock().values().filter_map(|alarm| alarm.due).min()
    }

    fn take_expired(&self, now: Instant) -> Vec<SharedCallback> {
        let mut alarms = self.alarms.lock();
        alarms
            .values_mut()
            .filter(|alarm| alarm.due.is_some_and(|due| due <= now))
            .map(|alarm| {
                alarm.due = None;
                alarm.callback.clone()
            })
            .collect()
    }

    /// Drop `registration` if it is still the one installed for its owner
    fn retire(&self, registration: &Arc<Registration>) {
        let mut registrations = self.registrations.lock();
        if registrations
            .get(&registration.owner)
            .is_some_and(|current| Arc::ptr_eq(current, registration))
        {
            registrations.remove(&registration.owner);
        }
    }

    fn is_current(&self, registration: &Arc<Registration>) -> bool {
        self.registrations
            .lock()
            .get(&registration.owner)
            .is_some_and(|current| Arc::ptr_eq(current, registration))
    }
}

/// Run one poll iteration; false when the loop must stop
fn iterate(shared: &Shared) -> bool {
    let registrations: Vec<Arc<Registration>> =
        shared.registrations.lock().values().cloned().collect();

    let timeout = match shared.next_deadline() {
        Some(due) => {
            let remaining = due.saturating_duration_since(Instant::now());
            // Round up so an alarm is never polled for early
            let millis = remaining.as_micros().div_ceil(1000);
            PollTimeout::from(millis.min(u128::from(u16::MAX)) as u16)
        }
        None => PollTimeout::NONE,
    };

    let revents: Vec<PollFlags> = {
        let mut fds = Vec::with_capacity(registrations.len() + 1);
        fds.push(PollFd::new(shared.wake_rx.as_fd(), PollFlags::POLLIN));
        for registration in &registrations {
            fds.push(PollFd::new(registration.fd.as_fd(), PollFlags::POLLIN));
        }

        match poll(&mut fds, timeout) {
            Ok(_) => {}
            Err(Errno::EINTR) => return true,
            Err(e) => {
                error!(error = %e, "Main loop poll failed");
                return false;
            }
        }

        fds.iter()
            .map(|fd| fd.revents().unwrap_or_else(PollFlags::empty))
            .collect()
    };

    if !shared.running.load(Ordering::Acquire) {
        return false;
    }

    if revents[0].contains(PollFlags::POLLIN) {
        shared.drain_wake();
    }

    let hangup = PollFlags::POLLHUP | PollFlags::POLLERR | PollFlags::POLLNVAL;
    for (registration, flags) in registrations.iter().zip(&revents[1..]) {
        if flags.is_empty() || !shared.is_current(registration) {
            continue;
        }
        if flags.intersects(hangup) {
            debug!(owner = %registration.owner, ?flags, "Registered fd hung up, dropping registration");
            (registration.handler)();
            shared.retire(registration);
        } else if flags.contains(PollFlags::POLLIN) {
            trace!(owner = %registration.owner, "fd readable");
            (registration.handler)();
        }
    }

    for callback in shared.take_expired(Instant::now()) {
        callback();
    }

    true
}

/// Main loop running on its own thread
pub struct ThreadedMainLoop {
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadedMainLoop {
    /// Spawn the loop thread
    pub fn start() -> io::Result<Self> {
        let (wake_tx, wake_rx) = UnixDatagram::pair()?;
        wake_tx.set_nonblocking(true)?;
        wake_rx.set_nonblocking(true)?;

        let shared = Arc::new(Shared {
            registrations: Mutex::new(HashMap::new()),
            alarms: Mutex::new(HashMap::new()),
            next_alarm_id: AtomicU64::new(1),
            running: AtomicBool::new(true),
            wake_tx,
            wake_rx,
        });

        let loop_shared = shared.clone();
        let thread = thread::Builder::new()
            .name("input-main-loop".to_string())
            .spawn(move || {
                debug!("Main loop thread started");
                while loop_shared.running.load(Ordering::Acquire) && iterate(&loop_shared) {}
                debug!("Main loop thread exiting");
            })?;

        info!("Main loop started");
        Ok(Self {
            shared,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Stop the loop thread and wait for it, unless called from the loop itself
    pub fn stop(&self) {
        if !self.shared.running.swap(false, Ordering::AcqRel) {
            return;
        }
        self.shared.wake();

        let Some(handle) = self.thread.lock().take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            // Stopping from a callback: the loop exits after this iteration
            return;
        }
        if handle.join().is_err() {
            error!("Main loop thread panicked");
        }
        info!("Main loop stopped");
    }

    /// Whether the loop thread is still running
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Number of fd registrations
    pub fn registration_count(&self) -> usize {
        self.shared.registrations.lock().len()
    }

    /// Number of alarms currently armed
    pub fn armed_alarm_count(&self) -> usize {
        self.shared
            .alarms
            .lock()
            .values()
            .filter(|alarm| alarm.due.is_some())
            .count()
    }
}

impl MainLoop for ThreadedMainLoop {
    fn register_fd_handler(&self, fd: BorrowedFd<'_>, owner: ChannelId, handler: FdHandler) {
        let fd = match fd.try_clone_to_owned() {
            Ok(fd) => fd,
            Err(e) => {
                error!(%owner, error = %e, "Failed to duplicate fd for main loop registration");
                return;
            }
        };

        let registration = Arc::new(Registration {
            owner,
            fd,
            handler: Arc::from(handler),
        });
        if self
            .shared
            .registrations
            .lock()
            .insert(owner, registration)
            .is_some()
        {
            warn!(%owner, "Replaced existing fd registration");
        }
        trace!(%owner, "Registered fd handler");
        self.shared.wake();
    }

    fn unregister_fd_handler(&self, owner: ChannelId) {
        if self.shared.registrations.lock().remove(&owner).is_some() {
            trace!(%owner, "Unregistered fd handler");
            self.shared.wake();
        }
    }

    fn create_alarm(&self, callback: AlarmCallback) -> Box<dyn Alarm> {
        let id = self.shared.next_alarm_id.fetch_add(1, Ordering::Relaxed);
        self.shared.alarms.lock().insert(
            id,
            AlarmEntry {
                due: None,
                callback: Arc::from(callback),
            },
        );
        Box::new(ThreadedAlarm {
            id,
            shared: self.shared.clone(),
        })
    }
}

impl Drop for ThreadedMainLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

struct ThreadedAlarm {
    id: u64,
    shared: Arc<Shared>,
}

impl Alarm for ThreadedAlarm {
    fn reschedule_in(&self, delay: Duration) {
        if let Some(alarm) = self.shared.alarms.lock().get_mut(&self.id) {
            alarm.due = Some(Instant::now() + delay);
        }
        self.shared.wake();
    }

    fn cancel(&self) -> bool {
        self.shared
            .alarms
            .lock()
            .get_mut(&self.id)
            .and_then(|alarm| alarm.due.take())
            .is_some()
    }

    fn is_pending(&self) -> bool {
        self.shared
            .alarms
            .lock()
            .get(&self.id)
            .is_some_and(|alarm| alarm.due.is_some())
    }
}

impl Drop for ThreadedAlarm {
    fn drop(&mut self) {
        self.shared.alarms.lock().remove(&self.id);
    }
}
