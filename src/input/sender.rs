//! Sender facade and transfer table
//!
//! [`InputSender`] is what producers talk to. It keeps one [`Transfer`] per
//! input channel, creating and destroying them as the scene reports surfaces
//! coming and going, and routes each delivered event to the transfer for its
//! channel.
//!
//! # Locking
//!
//! ```text
//!   deliver()                      surface_added/removed()
//!      │                                   │
//!      ▼                                   ▼
//!   ┌─────────────── table lock ────────────────┐
//!   │ lookup transfer        insert / remove    │
//!   │ allocate sequence id                      │
//!   └───────────────────────────────────────────┘
//!      │ (released)                        │ (released)
//!      ▼                                   ▼
//!   Transfer::send                   Transfer::teardown
//! ```
//!
//! The table lock is never held while a transfer lock is taken, and neither
//! is held while the observer runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use super::channel::ChannelId;
use super::error::{InputSendError, Result};
use super::event::InputEvent;
use super::observer::{DeliveryReport, InputSendObserver};
use super::scene_watcher::SceneWatcher;
use super::sequence::SequenceAllocator;
use super::surface::{Scene, SceneObserver, Surface};
use super::transfer::{DeliveryContext, DeliverySettings, SendStatus, Transfer, TransferState};
use crate::main_loop::MainLoop;

struct TransferTable {
    transfers: HashMap<ChannelId, Arc<Transfer>>,
    sequence: SequenceAllocator,
}

/// State shared between the facade and the scene watcher
pub(crate) struct SenderState {
    context: Arc<DeliveryContext>,
    table: Mutex<TransferTable>,
}

impl SenderState {
    fn new(context: DeliveryContext) -> Self {
        Self {
            context: Arc::new(context),
            table: Mutex::new(TransferTable {
                transfers: HashMap::new(),
                sequence: SequenceAllocator::new(),
            }),
        }
    }

    pub(crate) fn surface_added(&self, surface: &dyn Surface) {
        let Some(channel) = surface.input_channel() else {
            trace!(surface = %surface.id(), "Surface has no input channel");
            return;
        };
        let channel_id = channel.id();
        let surface_id = surface.id();

        // A stale transfer is torn down before the new one goes in: both
        // register readiness under the same channel id.
        loop {
            let displaced = {
                let mut table = self.table.lock();
                match table.transfers.get(&channel_id) {
                    Some(existing) if existing.used_for_surface(surface_id) => {
                        trace!(%channel_id, surface = %surface_id, "Transfer already exists");
                        return;
                    }
                    Some(_) => table.transfers.remove(&channel_id),
                    None => {
                        let transfer = Transfer::new(self.context.clone(), channel.clone(), surface);
                        table.transfers.insert(channel_id, transfer);
                        return;
                    }
                }
            };

            if let Some(old) = displaced {
                warn!(
                    %channel_id,
                    old_surface = %old.surface_id(),
                    new_surface = %surface_id,
                    "Input channel reused by another surface, replacing transfer"
                );
                old.teardown();
            }
        }
    }

    pub(crate) fn surface_removed(&self, surface: &dyn Surface) {
        let surface_id = surface.id();
        let channel_id = surface.input_channel().map(|channel| channel.id());

        let removed = {
            let mut table = self.table.lock();
            let key = channel_id
                .filter(|id| {
                    table
                        .transfers
                        .get(id)
                        .is_some_and(|t| t.used_for_surface(surface_id))
                })
                .or_else(|| {
                    table
                        .transfers
                        .iter()
                        .find(|(_, t)| t.used_for_surface(surface_id))
                        .map(|(id, _)| *id)
                });
            key.and_then(|id| table.transfers.remove(&id))
        };

        match removed {
            Some(transfer) => transfer.teardown(),
            None => trace!(surface = %surface_id, "No transfer for removed surface"),
        }
    }

    fn deliver(&self, event: InputEvent, channel: ChannelId) -> Result<SendStatus> {
        let (transfer, sequence_id) = {
            let mut table = self.table.lock();
            let Some(transfer) = table.transfers.get(&channel).cloned() else {
                warn!(%channel, kind = ?event.kind(), "Failure sending input event: unknown channel");
                return Err(InputSendError::UnknownChannel(channel));
            };
            (transfer, table.sequence.next())
        };

        trace!(%channel, sequence_id, kind = ?event.kind(), "Delivering input event");
        transfer.send(sequence_id, event)
    }

    fn teardown_all(&self) {
        let transfers: Vec<Arc<Transfer>> = self
            .table
            .lock()
            .transfers
            .drain()
            .map(|(_, transfer)| transfer)
            .collect();

        for transfer in transfers {
            transfer.teardown();
        }
    }
}

/// Routes input events to client surfaces and tracks their acknowledgement
///
/// Created attached to a [`Scene`]; surfaces already in the scene get a
/// transfer immediately. Dropping the sender detaches it and fails every
/// outstanding event with `SurfaceGone`.
pub struct InputSender {
    state: Arc<SenderState>,
    scene: Arc<dyn Scene>,
    watcher: Arc<dyn SceneObserver>,
    shut_down: AtomicBool,
}

impl InputSender {
    /// Attach a sender to `scene`
    ///
    /// `observer` is optional: without one, outcomes are only visible through
    /// `report` and the logs.
    pub fn new(
        scene: Arc<dyn Scene>,
        main_loop: Arc<dyn MainLoop>,
        observer: Option<Arc<dyn InputSendObserver>>,
        report: Arc<dyn DeliveryReport>,
        settings: DeliverySettings,
    ) -> Self {
        let state = Arc::new(SenderState::new(DeliveryContext::new(
            main_loop, observer, report, settings,
        )));
        let watcher: Arc<dyn SceneObserver> = Arc::new(SceneWatcher::new(Arc::downgrade(&state)));
        scene.add_observer(watcher.clone());

        info!(
            timeout_ms = settings.response_timeout.as_millis() as u64,
            max_acks_per_drain = settings.max_acks_per_drain,
            transfers = state.table.lock().transfers.len(),
            "Input sender attached to scene"
        );

        Self {
            state,
            scene,
            watcher,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Send `event` to the surface owning `channel`
    ///
    /// Returns [`InputSendError::UnknownChannel`] when no surface in the scene
    /// owns `channel`; nothing is allocated or published in that case.
    pub fn deliver(&self, event: InputEvent, channel: ChannelId) -> Result<SendStatus> {
        self.state.deliver(event, channel)
    }

    /// Register a transfer for `surface` if it has an input channel
    pub fn surface_added(&self, surface: &dyn Surface) {
        self.state.surface_added(surface);
    }

    /// Tear down the transfer for `surface`
    pub fn surface_removed(&self, surface: &dyn Surface) {
        self.state.surface_removed(surface);
    }

    /// Detach from the scene and tear down every transfer
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("Shutting down input sender");
        self.scene.remove_observer(&self.watcher);
        self.state.teardown_all();
    }

    /// Delivery tuning in effect
    pub fn settings(&self) -> DeliverySettings {
        self.state.context.settings()
    }

    /// Number of live transfers
    pub fn transfer_count(&self) -> usize {
        self.state.table.lock().transfers.len()
    }

    /// Channels with a live transfer
    pub fn channels(&self) -> Vec<ChannelId> {
        let mut channels: Vec<ChannelId> = self.state.table.lock().transfers.keys().copied().collect();
        channels.sort();
        channels
    }

    /// Events awaiting acknowledgement on `channel`
    pub fn pending_count(&self, channel: ChannelId) -> Option<usize> {
        self.transfer(channel).map(|transfer| transfer.pending_count())
    }

    /// State of the transfer for `channel`
    pub fn transfer_state(&self, channel: ChannelId) -> Option<TransferState> {
        self.transfer(channel).map(|transfer| transfer.state())
    }

    fn transfer(&self, channel: ChannelId) -> Option<Arc<Transfer>> {
        self.state.table.lock().transfers.get(&channel).cloned()
    }
}

impl Drop for InputSender {
    fn drop(&mut self) {
        self.shutdown();
    }
}
