//! Delivery outcome reporting
//!
//! Two sinks receive information from the delivery subsystem:
//!
//! - [`InputSendObserver`] learns the fate of every event: consumed, not
//!   consumed, blocked, or failed with a [`FailureReason`]. Producers use it to
//!   drive their own resend policy.
//! - [`DeliveryReport`] sees the wire-level activity (what was published with
//!   which sequence id, which finished signals came back) for tracing and
//!   metrics.
//!
//! Observer calls are made without any subsystem lock held, so an observer
//! may call back into [`InputSender`](super::InputSender).

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::channel::ChannelId;
use super::event::InputEvent;
use super::surface::SurfaceId;
use crate::utils::metrics::{metric_names, MetricsCollector};

/// Why an event was not delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureReason {
    /// The client end of the channel is gone
    PeerGone,
    /// No finished signal arrived before the deadline
    TimedOut,
    /// The surface was removed while the event was outstanding
    SurfaceGone,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::PeerGone => write!(f, "peer gone"),
            FailureReason::TimedOut => write!(f, "timed out"),
            FailureReason::SurfaceGone => write!(f, "surface gone"),
        }
    }
}

/// What the client did with a delivered event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Consumption {
    /// The client handled the event
    Consumed,
    /// The client received but did not handle the event
    NotConsumed,
}

impl From<bool> for Consumption {
    fn from(handled: bool) -> Self {
        if handled {
            Consumption::Consumed
        } else {
            Consumption::NotConsumed
        }
    }
}

/// Learns the outcome of every delivery attempt
#[cfg_attr(test, mockall::automock)]
pub trait InputSendObserver: Send + Sync {
    /// The channel was full; the event was dropped
    fn client_blocked(&self, event: &InputEvent, surface: SurfaceId);

    /// The event was dropped for `reason`
    fn send_failed(&self, event: &InputEvent, surface: SurfaceId, reason: FailureReason);

    /// The client acknowledged the event
    fn send_succeeded(&self, event: &InputEvent, surface: SurfaceId, consumption: Consumption);
}

/// Wire-level activity hooks
pub trait DeliveryReport: Send + Sync {
    /// A key event was handed to the channel
    fn published_key_event(&self, channel: ChannelId, sequence_id: u32, event_time_ns: u64);

    /// A touch or pointer event was handed to the channel
    fn published_motion_event(&self, channel: ChannelId, sequence_id: u32, event_time_ns: u64);

    /// A finished signal was read from the channel
    fn received_event_finished_signal(&self, channel: ChannelId, sequence_id: u32);
}

/// [`DeliveryReport`] that logs through `tracing` and optionally counts
#[derive(Default)]
pub struct TracingReport {
    metrics: Option<Arc<MetricsCollector>>,
}

impl TracingReport {
    /// Report that only logs
    pub fn new() -> Self {
        Self { metrics: None }
    }

    /// Report that logs and counts into `metrics`
    pub fn with_metrics(metrics: Arc<MetricsCollector>) -> Self {
        Self {
            metrics: Some(metrics),
        }
    }
}

impl DeliveryReport for TracingReport {
    fn published_key_event(&self, channel: ChannelId, sequence_id: u32, event_time_ns: u64) {
        trace!(%channel, sequence_id, event_time_ns, "Published key event");
        if let Some(metrics) = &self.metrics {
            metrics.increment_counter(metric_names::KEY_EVENTS_PUBLISHED, 1);
        }
    }

    fn published_motion_event(&self, channel: ChannelId, sequence_id: u32, event_time_ns: u64) {
        trace!(%channel, sequence_id, event_time_ns, "Published motion event");
        if let Some(metrics) = &self.metrics {
            metrics.increment_counter(metric_names::MOTION_EVENTS_PUBLISHED, 1);
        }
    }

    fn received_event_finished_signal(&self, channel: ChannelId, sequence_id: u32) {
        trace!(%channel, sequence_id, "Received finished signal");
        if let Some(metrics) = &self.metrics {
            metrics.increment_counter(metric_names::FINISHED_SIGNALS, 1);
        }
    }
}

/// [`InputSendObserver`] that tallies outcomes into a [`MetricsCollector`]
pub struct StatsObserver {
    metrics: Arc<MetricsCollector>,
    clock_origin: Option<Instant>,
}

impl StatsObserver {
    /// Create an observer counting into `metrics`
    pub fn new(metrics: Arc<MetricsCollector>) -> Self {
        Self {
            metrics,
            clock_origin: None,
        }
    }

    /// Also record delivery latency, for producers whose event timestamps
    /// are nanoseconds since `origin`
    pub fn with_clock_origin(metrics: Arc<MetricsCollector>, origin: Instant) -> Self {
        Self {
            metrics,
            clock_origin: Some(origin),
        }
    }
}

impl InputSendObserver for StatsObserver {
    fn client_blocked(&self, event: &InputEvent, surface: SurfaceId) {
        debug!(%surface, kind = ?event.kind(), "Client blocked, event dropped");
        self.metrics
            .increment_counter(metric_names::EVENTS_BLOCKED, 1);
    }

    fn send_failed(&self, event: &InputEvent, surface: SurfaceId, reason: FailureReason) {
        warn!(%surface, kind = ?event.kind(), %reason, "Input event not delivered");
        let name = match reason {
            FailureReason::PeerGone => metric_names::EVENTS_FAILED_PEER_GONE,
            FailureReason::TimedOut => metric_names::EVENTS_FAILED_TIMED_OUT,
            FailureReason::SurfaceGone => metric_names::EVENTS_FAILED_SURFACE_GONE,
        };
        self.metrics.increment_counter(name, 1);
    }

    fn send_succeeded(&self, event: &InputEvent, surface: SurfaceId, consumption: Consumption) {
        trace!(%surface, kind = ?event.kind(), ?consumption, "Input event acknowledged");
        let name = match consumption {
            Consumption::Consumed => metric_names::EVENTS_CONSUMED,
            Consumption::NotConsumed => metric_names::EVENTS_NOT_CONSUMED,
        };
        self.metrics.increment_counter(name, 1);

        if let Some(origin) = self.clock_origin {
            let now_ns = origin.elapsed().as_nanos() as u64;
            let latency_ns = now_ns.saturating_sub(event.timestamp_ns());
            self.metrics
                .record_histogram(metric_names::DELIVERY_LATENCY_MS, latency_ns as f64 / 1e6);
        }
    }
}
