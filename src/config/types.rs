//! Configuration type definitions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::input::{DEFAULT_MAX_ACKS_PER_DRAIN, DEFAULT_RESPONSE_TIMEOUT};

/// Delivery tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Time a client has to acknowledge an event, in milliseconds
    pub response_timeout_ms: u64,

    /// Acknowledgements handled per readiness callback (0 = no limit)
    pub max_acks_per_drain: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT.as_millis() as u64,
            max_acks_per_drain: DEFAULT_MAX_ACKS_PER_DRAIN,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level ("trace", "debug", "info", "warn", "error")
    pub level: String,

    /// Output format ("pretty", "compact", "json")
    pub format: String,

    /// Also write logs to this file
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            log_file: None,
        }
    }
}

/// Loopback demo driver
///
/// The binary creates `surfaces` surfaces, each backed by a datagram channel
/// with a client thread on the other end, and pushes `events_per_surface`
/// events through each.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopbackConfig {
    /// Number of surfaces
    pub surfaces: usize,

    /// Events delivered to each surface
    pub events_per_surface: usize,

    /// Pause between events, in milliseconds
    pub event_interval_ms: u64,

    /// Client delay before acknowledging, in milliseconds
    pub client_ack_delay_ms: u64,

    /// Client reports every Nth event as consumed, the rest as not consumed
    pub client_consume_every: usize,

    /// Client never acknowledges every Nth event (0 = acknowledge all)
    pub client_drop_every: usize,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            surfaces: 3,
            events_per_surface: 200,
            event_interval_ms: 2,
            client_ack_delay_ms: 0,
            client_consume_every: 1,
            client_drop_every: 0,
        }
    }
}
