//! Per-surface delivery state machine
//!
//! A [`Transfer`] owns one surface's input channel, the FIFO of events that
//! were published but not yet acknowledged, and one alarm guarding the oldest
//! of them.
//!
//! # States
//!
//! ```text
//!            send ok                      teardown
//!   ┌──────┐ ─────────────> ┌────────┐ ─────────────> ┌───────────┐
//!   │ Idle │                │ Active │                │ Torn down │
//!   └──────┘ <───────────── └────────┘                └───────────┘
//!      │      last entry acked                              ^
//!      │      or timed out                                  │
//!      └────────────────────────────────────────────────────┘
//!                           teardown
//! ```
//!
//! - **Idle**: nothing pending, not subscribed to readiness, alarm disarmed.
//! - **Active**: one or more entries pending, subscribed, alarm armed for the
//!   oldest entry's deadline.
//! - **Torn down**: terminal. Sends are discarded, late callbacks do nothing.
//!
//! # Threads
//!
//! `send` runs on the producer's thread, readiness and alarm callbacks on the
//! main loop thread, `teardown` on the scene thread. The pending queue, alarm
//! and torn-down flag live behind one mutex; the readiness subscription is an
//! atomic flag so that racing unsubscribes resolve to exactly one
//! `unregister_fd_handler`. The mutex is never held while the observer runs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

use super::channel::{ChannelId, InputChannel, PublishError};
use super::error::{InputSendError, Result};
use super::event::InputEvent;
use super::observer::{Consumption, DeliveryReport, FailureReason, InputSendObserver};
use super::surface::{Surface, SurfaceId};
use crate::main_loop::{Alarm, MainLoop};

/// Default time a client has to acknowledge an event
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default cap on acknowledgements handled per readiness callback
pub const DEFAULT_MAX_ACKS_PER_DRAIN: usize = 256;

/// Delivery tuning shared by all transfers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliverySettings {
    /// Deadline for each published event
    pub response_timeout: Duration,
    /// Acknowledgements handled per readiness callback, 0 = until exhausted
    pub max_acks_per_drain: usize,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            max_acks_per_drain: DEFAULT_MAX_ACKS_PER_DRAIN,
        }
    }
}

/// Collaborators every transfer needs
pub struct DeliveryContext {
    pub(crate) main_loop: Arc<dyn MainLoop>,
    pub(crate) observer: Option<Arc<dyn InputSendObserver>>,
    pub(crate) report: Arc<dyn DeliveryReport>,
    pub(crate) settings: DeliverySettings,
}

impl DeliveryContext {
    /// Bundle the collaborators
    pub fn new(
        main_loop: Arc<dyn MainLoop>,
        observer: Option<Arc<dyn InputSendObserver>>,
        report: Arc<dyn DeliveryReport>,
        settings: DeliverySettings,
    ) -> Self {
        Self {
            main_loop,
            observer,
            report,
            settings,
        }
    }

    /// Delivery tuning
    pub fn settings(&self) -> DeliverySettings {
        self.settings
    }
}

/// An event waiting for its finished signal
#[derive(Debug, Clone)]
pub struct PendingEntry {
    /// Sequence id the event was published with
    pub sequence_id: u32,
    /// The event itself
    pub event: InputEvent,
    /// Channel it was published on
    pub channel: ChannelId,
    /// When the entry times out
    pub deadline: Instant,
}

/// Observable state of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    /// Nothing pending
    Idle,
    /// Waiting for at least one acknowledgement
    Active,
    /// Surface is gone; terminal
    TornDown,
}

/// What a main loop callback is telling the transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferSignal {
    /// The channel fd is readable, finished signals may be waiting
    Readiness,
    /// The alarm for the oldest entry fired
    TimedOut,
}

/// Result of a send that did not hit a fatal transport error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// Published and waiting for acknowledgement under this sequence id
    Queued(u32),
    /// Channel full; observer told, event dropped
    Blocked,
    /// Client gone; observer told, event dropped
    PeerGone,
    /// Transfer already torn down; nothing published
    Discarded,
}

struct TransferInner {
    pending: VecDeque<PendingEntry>,
    alarm: Option<Box<dyn Alarm>>,
    torn_down: bool,
}

/// Delivery state for one surface's input channel
pub struct Transfer {
    context: Arc<DeliveryContext>,
    channel: Arc<dyn InputChannel>,
    channel_id: ChannelId,
    surface: SurfaceId,
    surface_name: String,
    subscribed: AtomicBool,
    inner: Mutex<TransferInner>,
    weak_self: Weak<Transfer>,
}

impl Transfer {
    /// Create an idle transfer for `surface` over `channel`
    pub fn new(
        context: Arc<DeliveryContext>,
        channel: Arc<dyn InputChannel>,
        surface: &dyn Surface,
    ) -> Arc<Self> {
        let channel_id = channel.id();
        let surface_id = surface.id();
        let surface_name = surface.name();
        debug!(%channel_id, surface = %surface_id, name = %surface_name, "Creating input transfer");

        Arc::new_cyclic(|weak_self| Self {
            context,
            channel,
            channel_id,
            surface: surface_id,
            surface_name,
            subscribed: AtomicBool::new(false),
            inner: Mutex::new(TransferInner {
                pending: VecDeque::new(),
                alarm: None,
                torn_down: false,
            }),
            weak_self: weak_self.clone(),
        })
    }

    /// Channel this transfer publishes on
    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    /// Surface this transfer delivers to
    pub fn surface_id(&self) -> SurfaceId {
        self.surface
    }

    /// Surface name, for logs
    pub fn surface_name(&self) -> &str {
        &self.surface_name
    }

    /// Whether this transfer was created for `surface`
    pub fn used_for_surface(&self, surface: SurfaceId) -> bool {
        self.surface == surface
    }

    /// Current state
    pub fn state(&self) -> TransferState {
        let inner = self.inner.lock();
        if inner.torn_down {
            TransferState::TornDown
        } else if inner.pending.is_empty() {
            TransferState::Idle
        } else {
            TransferState::Active
        }
    }

    /// Number of entries waiting for acknowledgement
    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Sequence ids waiting for acknowledgement, oldest first
    pub fn pending_sequence_ids(&self) -> Vec<u32> {
        self.inner
            .lock()
            .pending
            .iter()
            .map(|entry| entry.sequence_id)
            .collect()
    }

    /// Whether the channel fd is registered with the main loop
    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::Acquire)
    }

    /// Whether the response alarm is armed
    pub fn alarm_pending(&self) -> bool {
        self.inner
            .lock()
            .alarm
            .as_ref()
            .map(|alarm| alarm.is_pending())
            .unwrap_or(false)
    }

    /// Publish `event` under `sequence_id` and track it until acknowledged
    ///
    /// Back-pressure and peer death are reported to the observer and return
    /// `Ok`; only unclassified transport failures return an error.
    pub fn send(&self, sequence_id: u32, event: InputEvent) -> Result<SendStatus> {
        let mut inner = self.inner.lock();
        if inner.torn_down {
            debug!(channel = %self.channel_id, sequence_id, "Transfer torn down, discarding event");
            return Ok(SendStatus::Discarded);
        }

        match self.publish(sequence_id, &event) {
            Ok(()) => {
                let entry = PendingEntry {
                    sequence_id,
                    event,
                    channel: self.channel_id,
                    deadline: Instant::now() + self.context.settings.response_timeout,
                };
                self.enqueue_locked(&mut inner, entry);
                Ok(SendStatus::Queued(sequence_id))
            }
            Err(PublishError::WouldBlock) => {
                drop(inner);
                warn!(
                    channel = %self.channel_id,
                    surface = %self.surface_name,
                    sequence_id,
                    "Client not reading input, event dropped"
                );
                if let Some(observer) = &self.context.observer {
                    observer.client_blocked(&event, self.surface);
                }
                Ok(SendStatus::Blocked)
            }
            Err(PublishError::PeerGone) => {
                drop(inner);
                debug!(
                    channel = %self.channel_id,
                    surface = %self.surface_name,
                    sequence_id,
                    "Client end of input channel is gone"
                );
                if let Some(observer) = &self.context.observer {
                    observer.send_failed(&event, self.surface, FailureReason::PeerGone);
                }
                Ok(SendStatus::PeerGone)
            }
            Err(PublishError::Io(source)) => {
                drop(inner);
                error!(
                    channel = %self.channel_id,
                    surface = %self.surface_name,
                    sequence_id,
                    error = %source,
                    "Failure sending input event"
                );
                Err(InputSendError::Transport {
                    channel: self.channel_id,
                    source,
                })
            }
        }
    }

    /// Entry point for main loop callbacks
    pub fn handle_signal(&self, signal: TransferSignal) {
        match signal {
            TransferSignal::Readiness => self.on_readiness(),
            TransferSignal::TimedOut => self.on_response_timeout(),
        }
    }

    /// Settle the entry published as `sequence_id`
    ///
    /// Returns false if no such entry is pending (stale or duplicate ack).
    pub fn on_ack(&self, sequence_id: u32, handled: bool) -> bool {
        let entry = {
            let mut inner = self.inner.lock();
            let Some(pos) = inner
                .pending
                .iter()
                .position(|entry| entry.sequence_id == sequence_id)
            else {
                trace!(channel = %self.channel_id, sequence_id, "Ignoring acknowledgement for unknown sequence");
                return false;
            };
            let entry = inner.pending.remove(pos);
            self.rearm_locked(&mut inner);
            entry
        };

        if let Some(entry) = entry {
            if let Some(observer) = &self.context.observer {
                observer.send_succeeded(&entry.event, self.surface, Consumption::from(handled));
            }
        }
        true
    }

    /// Fail the oldest pending entry
    pub fn on_response_timeout(&self) {
        let entry = {
            let mut inner = self.inner.lock();
            let Some(entry) = inner.pending.pop_front() else {
                // Alarm raced with the last acknowledgement
                return;
            };
            self.rearm_locked(&mut inner);
            entry
        };

        warn!(
            channel = %self.channel_id,
            surface = %self.surface_name,
            sequence_id = entry.sequence_id,
            "No response to input event"
        );
        if let Some(observer) = &self.context.observer {
            observer.send_failed(&entry.event, self.surface, FailureReason::TimedOut);
        }
    }

    /// Stop delivering: every pending entry fails with `SurfaceGone`, newest first
    ///
    /// Safe to call more than once; later calls report nothing.
    pub fn teardown(&self) {
        let released = {
            let mut inner = self.inner.lock();
            if !inner.torn_down {
                debug!(channel = %self.channel_id, surface = %self.surface_name, "Tearing down input transfer");
            }
            inner.torn_down = true;
            if let Some(alarm) = inner.alarm.take() {
                alarm.cancel();
            }
            self.unsubscribe();
            std::mem::take(&mut inner.pending)
        };

        if let Some(observer) = &self.context.observer {
            for entry in released.iter().rev() {
                observer.send_failed(&entry.event, self.surface, FailureReason::SurfaceGone);
            }
        }
    }

    /// Register for readiness; no-op when already registered
    pub fn subscribe(&self) {
        if self
            .subscribed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let weak = self.weak_self.clone();
            self.context.main_loop.register_fd_handler(
                self.channel.readiness_fd(),
                self.channel_id,
                Box::new(move || {
                    if let Some(transfer) = weak.upgrade() {
                        transfer.handle_signal(TransferSignal::Readiness);
                    }
                }),
            );
        }
    }

    /// Drop the readiness registration; exactly one caller wins
    pub fn unsubscribe(&self) {
        if self
            .subscribed
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.context.main_loop.unregister_fd_handler(self.channel_id);
        }
    }

    fn publish(&self, sequence_id: u32, event: &InputEvent) -> std::result::Result<(), PublishError> {
        let report = &self.context.report;
        let event_time = event.timestamp_ns();
        match event {
            InputEvent::Key(key) => {
                let result = self.channel.publish_key(sequence_id, key);
                report.published_key_event(self.channel_id, sequence_id, event_time);
                result
            }
            InputEvent::Touch(touch) => {
                let result = self.channel.publish_touch(sequence_id, touch);
                report.published_motion_event(self.channel_id, sequence_id, event_time);
                result
            }
            InputEvent::Pointer(pointer) => {
                let result = self.channel.publish_pointer(sequence_id, pointer);
                report.published_motion_event(self.channel_id, sequence_id, event_time);
                result
            }
        }
    }

    /// Every message read counts toward the drain cap, decodable or not
    fn on_readiness(&self) {
        let limit = self.context.settings.max_acks_per_drain;
        let mut drained = 0usize;

        loop {
            if limit != 0 && drained >= limit {
                debug!(channel = %self.channel_id, drained, "Acknowledgement drain cap reached, deferring the rest");
                break;
            }

            match self.channel.receive_ack() {
                Ok(Some(ack)) => {
                    drained += 1;
                    self.context
                        .report
                        .received_event_finished_signal(self.channel_id, ack.sequence_id);
                    self.on_ack(ack.sequence_id, ack.handled);
                }
                Ok(None) => break,
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                    drained += 1;
                }
                Err(e) => {
                    debug!(channel = %self.channel_id, error = %e, "Reading finished signal failed");
                    break;
                }
            }
        }
    }

    fn enqueue_locked(&self, inner: &mut TransferInner, entry: PendingEntry) {
        self.subscribe();
        let was_empty = inner.pending.is_empty();
        inner.pending.push_back(entry);
        if was_empty {
            self.arm_alarm_locked(inner);
        }
    }

    /// After a removal: disarm and go idle, or cover the new oldest entry
    fn rearm_locked(&self, inner: &mut TransferInner) {
        if inner.pending.is_empty() {
            if let Some(alarm) = &inner.alarm {
                alarm.cancel();
            }
            self.unsubscribe();
        } else {
            self.arm_alarm_locked(inner);
        }
    }

    fn arm_alarm_locked(&self, inner: &mut TransferInner) {
        let Some(oldest) = inner.pending.front() else {
            return;
        };
        let delay = oldest.deadline.saturating_duration_since(Instant::now());

        let alarm = inner.alarm.get_or_insert_with(|| {
            let weak = self.weak_self.clone();
            self.context.main_loop.create_alarm(Box::new(move || {
                if let Some(transfer) = weak.upgrade() {
                    transfer.handle_signal(TransferSignal::TimedOut);
                }
            }))
        });
        alarm.reschedule_in(delay);
    }
}

impl Drop for Transfer {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
