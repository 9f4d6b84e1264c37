//! Loopback demo driver
//!
//! Wires the reference collaborators together in one process: a
//! [`BasicScene`] with one surface per [`DatagramChannel`], a client thread
//! reading the other end of each channel, a [`ThreadedMainLoop`], and an
//! [`InputSender`] driven by the calling thread.
//!
//! ```text
//!   producer ──deliver──> InputSender ──publish──> DatagramChannel ─┐
//!                              ▲                                    │ socket
//!                              │ finished signals                   ▼
//!                      ThreadedMainLoop <──────────────────── client thread
//! ```
//!
//! The client behaviour (ack delay, consumption ratio, ignored events) comes
//! from [`LoopbackConfig`](crate::config::LoopbackConfig), which makes it easy
//! to provoke timeouts and not-consumed acknowledgements.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{Config, LoopbackConfig};
use crate::input::{
    ChannelId, InputChannel, InputEvent, InputSender, KeyAction, SendStatus, StatsObserver,
    SurfaceId, TouchAction, TracingReport,
};
use crate::main_loop::ThreadedMainLoop;
use crate::scene::{BasicScene, BasicSurface};
use crate::transport::{ClientEndpoint, DatagramChannel};
use crate::utils::metrics::{metric_names, MetricsCollector, Timer};

const CLIENT_POLL_INTERVAL: Duration = Duration::from_millis(50);
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// What one client thread saw
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientStats {
    /// Surface the client belongs to
    pub surface: u64,
    /// Messages received
    pub received: usize,
    /// Finished signals sent
    pub acknowledged: usize,
    /// Messages deliberately left unacknowledged
    pub ignored: usize,
}

/// Outcome of a loopback run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoopbackSummary {
    /// Events handed to `deliver`
    pub attempted: usize,
    /// Events published and tracked
    pub queued: usize,
    /// Events dropped on a full channel
    pub blocked: usize,
    /// Events dropped on a dead peer
    pub peer_gone: usize,
    /// Events sent to a torn-down transfer
    pub discarded: usize,
    /// Events still unacknowledged when surfaces were removed
    pub outstanding_at_teardown: usize,
    /// Per-client statistics, ordered by surface
    pub clients: Vec<ClientStats>,
    /// Wall time of the run in milliseconds
    pub elapsed_ms: f64,
}

struct Client {
    surface: SurfaceId,
    channel: ChannelId,
    handle: JoinHandle<()>,
}

/// Run the loopback demo described by `config`, counting into `metrics`
pub fn run(config: &Config, metrics: Arc<MetricsCollector>) -> Result<LoopbackSummary> {
    let timer = Timer::new();
    let loopback = &config.loopback;
    let settings = config.to_delivery_settings();

    let main_loop = Arc::new(ThreadedMainLoop::start().context("Failed to start main loop")?);
    let scene = Arc::new(BasicScene::new());
    let origin = Instant::now();

    let sender = InputSender::new(
        scene.clone(),
        main_loop.clone(),
        Some(Arc::new(StatsObserver::with_clock_origin(
            metrics.clone(),
            origin,
        ))),
        Arc::new(TracingReport::with_metrics(metrics.clone())),
        settings,
    );

    let stop = Arc::new(AtomicBool::new(false));
    let (stats_tx, stats_rx) = unbounded();
    let mut clients = Vec::with_capacity(loopback.surfaces);

    for index in 0..loopback.surfaces {
        let (channel, endpoint) =
            DatagramChannel::pair().context("Failed to create input channel")?;
        let surface = SurfaceId::new(index as u64 + 1);
        let channel_id = channel.id();

        let handle = spawn_client(
            surface,
            endpoint,
            loopback.clone(),
            stop.clone(),
            stats_tx.clone(),
        )
        .context("Failed to spawn client thread")?;

        let channel: Arc<dyn InputChannel> = Arc::new(channel);
        scene.add_surface(Arc::new(BasicSurface::new(
            surface,
            format!("loopback-{}", index + 1),
            Some(channel),
        )));
        clients.push(Client {
            surface,
            channel: channel_id,
            handle,
        });
    }
    drop(stats_tx);

    metrics.set_gauge(metric_names::TRANSFERS_ACTIVE, sender.transfer_count() as f64);
    info!(
        surfaces = clients.len(),
        events_per_surface = loopback.events_per_surface,
        "Loopback clients ready"
    );

    let mut summary = LoopbackSummary::default();
    let interval = Duration::from_millis(loopback.event_interval_ms);

    for round in 0..loopback.events_per_surface {
        for client in &clients {
            let timestamp_ns = origin.elapsed().as_nanos() as u64;
            let event = demo_event(round, timestamp_ns);

            summary.attempted += 1;
            let status = sender
                .deliver(event, client.channel)
                .with_context(|| format!("Failed to deliver event to {}", client.surface))?;
            match status {
                SendStatus::Queued(_) => summary.queued += 1,
                SendStatus::Blocked => summary.blocked += 1,
                SendStatus::PeerGone => summary.peer_gone += 1,
                SendStatus::Discarded => summary.discarded += 1,
            }
        }
        if !interval.is_zero() {
            thread::sleep(interval);
        }
    }

    // Let acknowledgements and timeouts settle
    let deadline = Instant::now() + settings.response_timeout + DRAIN_GRACE;
    while Instant::now() < deadline && outstanding(&sender, &clients) > 0 {
        thread::sleep(Duration::from_millis(10));
    }

    summary.outstanding_at_teardown = outstanding(&sender, &clients);
    if summary.outstanding_at_teardown > 0 {
        warn!(
            outstanding = summary.outstanding_at_teardown,
            "Events still unacknowledged, removing surfaces"
        );
    }

    for client in &clients {
        scene.remove_surface(client.surface);
    }
    metrics.set_gauge(metric_names::TRANSFERS_ACTIVE, sender.transfer_count() as f64);

    stop.store(true, Ordering::Release);
    for client in clients {
        if client.handle.join().is_err() {
            warn!(surface = %client.surface, "Client thread panicked");
        }
    }

    summary.clients = stats_rx.iter().collect();
    summary.clients.sort_by_key(|stats| stats.surface);

    sender.shutdown();
    main_loop.stop();

    summary.elapsed_ms = timer.elapsed_ms();
    info!(
        attempted = summary.attempted,
        queued = summary.queued,
        blocked = summary.blocked,
        elapsed_ms = summary.elapsed_ms,
        "Loopback run finished"
    );
    Ok(summary)
}

fn outstanding(sender: &InputSender, clients: &[Client]) -> usize {
    clients
        .iter()
        .filter_map(|client| sender.pending_count(client.channel))
        .sum()
}

/// Cycle through key, pointer and touch events
fn demo_event(round: usize, timestamp_ns: u64) -> InputEvent {
    let offset = (round % 100) as f32;
    match round % 3 {
        0 => InputEvent::key(
            if round % 2 == 0 {
                KeyAction::Down
            } else {
                KeyAction::Up
            },
            30,
            0x1E,
            timestamp_ns,
        ),
        1 => InputEvent::pointer_motion(10.0 + offset, 20.0 + offset, timestamp_ns),
        _ => InputEvent::single_touch(TouchAction::Change, offset, offset, timestamp_ns),
    }
}

fn spawn_client(
    surface: SurfaceId,
    endpoint: ClientEndpoint,
    config: LoopbackConfig,
    stop: Arc<AtomicBool>,
    stats_tx: Sender<ClientStats>,
) -> std::io::Result<JoinHandle<()>> {
    endpoint.set_read_timeout(Some(CLIENT_POLL_INTERVAL))?;

    thread::Builder::new()
        .name(format!("loopback-client-{}", surface.raw()))
        .spawn(move || {
            let mut stats = ClientStats {
                surface: surface.raw(),
                ..ClientStats::default()
            };
            let ack_delay = Duration::from_millis(config.client_ack_delay_ms);

            while !stop.load(Ordering::Acquire) {
                let message = match endpoint.recv_message() {
                    Ok(Some(message)) => message,
                    Ok(None) => continue,
                    Err(e) => {
                        debug!(%surface, error = %e, "Client read failed, exiting");
                        break;
                    }
                };
                stats.received += 1;

                if config.client_drop_every != 0 && stats.received % config.client_drop_every == 0
                {
                    stats.ignored += 1;
                    continue;
                }
                if !ack_delay.is_zero() {
                    thread::sleep(ack_delay);
                }

                let handled = stats.received % config.client_consume_every == 0;
                if let Err(e) = endpoint.send_finished(message.sequence_id(), handled) {
                    debug!(%surface, error = %e, "Server end gone, client exiting");
                    break;
                }
                stats.acknowledged += 1;
            }

            let _ = stats_tx.send(stats);
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::EventKind;

    #[test]
    fn test_demo_events_cycle_kinds() {
        let kinds: Vec<EventKind> = (0..3).map(|round| demo_event(round, 0).kind()).collect();
        assert_eq!(
            kinds,
            vec![EventKind::Key, EventKind::Pointer, EventKind::Touch]
        );
        assert_eq!(demo_event(4, 77).timestamp_ns(), 77);
    }
}
