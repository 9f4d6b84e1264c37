//! Hand-driven collaborators for unit tests
//!
//! Nothing here runs on its own: tests push acknowledgements into a
//! [`FakeChannel`], then fire readiness or alarms on the [`ManualMainLoop`]
//! from the test thread, and inspect what the [`RecordingObserver`] saw.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::UnixDatagram;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::channel::{Acknowledgement, ChannelId, InputChannel, PublishError};
use super::event::{EventKind, InputEvent, KeyEvent, PointerEvent, TouchEvent};
use super::observer::{Consumption, DeliveryReport, FailureReason, InputSendObserver};
use super::surface::{Surface, SurfaceId};
use crate::main_loop::{Alarm, AlarmCallback, FdHandler, MainLoop};

/// Scripted publish result
pub(crate) enum Scripted {
    WouldBlock,
    PeerGone,
    Io(io::ErrorKind),
}

/// Channel that records publishes and replays queued acknowledgements
pub(crate) struct FakeChannel {
    id: ChannelId,
    published: Mutex<Vec<(u32, EventKind)>>,
    script: Mutex<VecDeque<Scripted>>,
    // None stands for a message that fails to decode
    acks: Mutex<VecDeque<Option<Acknowledgement>>>,
    fd: UnixDatagram,
}

impl FakeChannel {
    pub(crate) fn new(id: i32) -> Arc<Self> {
        Arc::new(Self {
            id: ChannelId::new(id),
            published: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
            acks: Mutex::new(VecDeque::new()),
            fd: UnixDatagram::unbound().expect("socket for fake channel"),
        })
    }

    /// Make the next publish fail
    pub(crate) fn fail_next(&self, result: Scripted) {
        self.script.lock().push_back(result);
    }

    pub(crate) fn push_ack(&self, sequence_id: u32, handled: bool) {
        self.acks.lock().push_back(Some(Acknowledgement {
            sequence_id,
            handled,
        }));
    }

    pub(crate) fn push_malformed(&self) {
        self.acks.lock().push_back(None);
    }

    pub(crate) fn published(&self) -> Vec<(u32, EventKind)> {
        self.published.lock().clone()
    }

    pub(crate) fn queued_acks(&self) -> usize {
        self.acks.lock().len()
    }

    fn publish(&self, sequence_id: u32, kind: EventKind) -> Result<(), PublishError> {
        match self.script.lock().pop_front() {
            Some(Scripted::WouldBlock) => return Err(PublishError::WouldBlock),
            Some(Scripted::PeerGone) => return Err(PublishError::PeerGone),
            Some(Scripted::Io(kind)) => return Err(PublishError::Io(io::Error::from(kind))),
            None => {}
        }
        self.published.lock().push((sequence_id, kind));
        Ok(())
    }
}

impl InputChannel for FakeChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn readiness_fd(&self) -> BorrowedFd<'_> {
        // Never polled by the manual loop
        self.fd.as_fd()
    }

    fn publish_key(&self, sequence_id: u32, _event: &KeyEvent) -> Result<(), PublishError> {
        self.publish(sequence_id, EventKind::Key)
    }

    fn publish_touch(&self, sequence_id: u32, _event: &TouchEvent) -> Result<(), PublishError> {
        self.publish(sequence_id, EventKind::Touch)
    }

    fn publish_pointer(
        &self,
        sequence_id: u32,
        _event: &PointerEvent,
    ) -> Result<(), PublishError> {
        self.publish(sequence_id, EventKind::Pointer)
    }

    fn receive_ack(&self) -> io::Result<Option<Acknowledgement>> {
        match self.acks.lock().pop_front() {
            Some(Some(ack)) => Ok(Some(ack)),
            Some(None) => Err(io::Error::new(io::ErrorKind::InvalidData, "malformed")),
            None => Ok(None),
        }
    }
}

/// Surface backed by an optional fake channel
pub(crate) struct FakeSurface {
    pub(crate) id: SurfaceId,
    pub(crate) channel: Option<Arc<FakeChannel>>,
}

impl FakeSurface {
    pub(crate) fn new(id: u64, channel: Option<Arc<FakeChannel>>) -> Self {
        Self {
            id: SurfaceId::new(id),
            channel,
        }
    }
}

impl Surface for FakeSurface {
    fn id(&self) -> SurfaceId {
        self.id
    }

    fn name(&self) -> String {
        format!("fake-{}", self.id.raw())
    }

    fn input_channel(&self) -> Option<Arc<dyn InputChannel>> {
        self.channel
            .clone()
            .map(|channel| channel as Arc<dyn InputChannel>)
    }
}

struct AlarmState {
    delay: Mutex<Option<Duration>>,
    callback: AlarmCallback,
}

struct ManualAlarm {
    state: Arc<AlarmState>,
}

impl Alarm for ManualAlarm {
    fn reschedule_in(&self, delay: Duration) {
        *self.state.delay.lock() = Some(delay);
    }

    fn cancel(&self) -> bool {
        self.state.delay.lock().take().is_some()
    }

    fn is_pending(&self) -> bool {
        self.state.delay.lock().is_some()
    }
}

/// Main loop whose callbacks only run when the test says so
#[derive(Default)]
pub(crate) struct ManualMainLoop {
    handlers: Mutex<HashMap<ChannelId, Arc<dyn Fn() + Send + Sync>>>,
    alarms: Mutex<Vec<Arc<AlarmState>>>,
    registrations: AtomicUsize,
    unregistrations: AtomicUsize,
}

impl ManualMainLoop {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn is_registered(&self, owner: ChannelId) -> bool {
        self.handlers.lock().contains_key(&owner)
    }

    pub(crate) fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    pub(crate) fn unregistrations(&self) -> usize {
        self.unregistrations.load(Ordering::SeqCst)
    }

    /// Run the readiness handler registered for `owner`; false if none
    pub(crate) fn fire_readiness(&self, owner: ChannelId) -> bool {
        let handler = self.handlers.lock().get(&owner).cloned();
        match handler {
            Some(handler) => {
                handler();
                true
            }
            None => false,
        }
    }

    /// Fire every pending alarm once; returns how many fired
    pub(crate) fn fire_alarms(&self) -> usize {
        let due: Vec<Arc<AlarmState>> = self
            .alarms
            .lock()
            .iter()
            .filter(|alarm| alarm.delay.lock().take().is_some())
            .cloned()
            .collect();
        for alarm in &due {
            (alarm.callback)();
        }
        due.len()
    }

    /// Fire an alarm callback even though it is not armed (late timer race)
    pub(crate) fn fire_all_alarm_callbacks(&self) {
        let alarms: Vec<Arc<AlarmState>> = self.alarms.lock().clone();
        for alarm in &alarms {
            (alarm.callback)();
        }
    }

    /// Delays of currently armed alarms
    pub(crate) fn armed_delays(&self) -> Vec<Duration> {
        self.alarms
            .lock()
            .iter()
            .filter_map(|alarm| *alarm.delay.lock())
            .collect()
    }
}

impl MainLoop for ManualMainLoop {
    fn register_fd_handler(&self, _fd: BorrowedFd<'_>, owner: ChannelId, handler: FdHandler) {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        self.handlers.lock().insert(owner, Arc::from(handler));
    }

    fn unregister_fd_handler(&self, owner: ChannelId) {
        self.unregistrations.fetch_add(1, Ordering::SeqCst);
        self.handlers.lock().remove(&owner);
    }

    fn create_alarm(&self, callback: AlarmCallback) -> Box<dyn Alarm> {
        let state = Arc::new(AlarmState {
            delay: Mutex::new(None),
            callback,
        });
        self.alarms.lock().push(state.clone());
        Box::new(ManualAlarm { state })
    }
}

/// Outcome as seen by the observer
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Outcome {
    Blocked(u64),
    Failed(u64, FailureReason),
    Succeeded(u64, Consumption),
}

/// Observer that records outcomes keyed by event timestamp
#[derive(Default)]
pub(crate) struct RecordingObserver {
    outcomes: Mutex<Vec<Outcome>>,
}

impl RecordingObserver {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn outcomes(&self) -> Vec<Outcome> {
        self.outcomes.lock().clone()
    }
}

impl InputSendObserver for RecordingObserver {
    fn client_blocked(&self, event: &InputEvent, _surface: SurfaceId) {
        self.outcomes
            .lock()
            .push(Outcome::Blocked(event.timestamp_ns()));
    }

    fn send_failed(&self, event: &InputEvent, _surface: SurfaceId, reason: FailureReason) {
        self.outcomes
            .lock()
            .push(Outcome::Failed(event.timestamp_ns(), reason));
    }

    fn send_succeeded(&self, event: &InputEvent, _surface: SurfaceId, consumption: Consumption) {
        self.outcomes
            .lock()
            .push(Outcome::Succeeded(event.timestamp_ns(), consumption));
    }
}

/// Report that records wire activity
#[derive(Default)]
pub(crate) struct RecordingReport {
    pub(crate) published_keys: Mutex<Vec<u32>>,
    pub(crate) published_motions: Mutex<Vec<u32>>,
    pub(crate) finished: Mutex<Vec<u32>>,
}

impl DeliveryReport for RecordingReport {
    fn published_key_event(&self, _channel: ChannelId, sequence_id: u32, _event_time_ns: u64) {
        self.published_keys.lock().push(sequence_id);
    }

    fn published_motion_event(&self, _channel: ChannelId, sequence_id: u32, _event_time_ns: u64) {
        self.published_motions.lock().push(sequence_id);
    }

    fn received_event_finished_signal(&self, _channel: ChannelId, sequence_id: u32) {
        self.finished.lock().push(sequence_id);
    }
}

/// Pointer motion whose timestamp doubles as a test label
pub(crate) fn labelled(label: u64) -> InputEvent {
    InputEvent::pointer_motion(0.0, 0.0, label)
}
