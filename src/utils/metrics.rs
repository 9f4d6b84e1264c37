//! Delivery Metrics
//!
//! Counters, gauges and histograms for the delivery subsystem:
//! - Events published, per wire encoding
//! - Acknowledgements received and their consumption
//! - Events dropped, per cause
//! - Delivery latency
//!
//! Metrics can be exported as Prometheus text or JSON.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant, SystemTime};

/// Thread-safe metrics registry
pub struct MetricsCollector {
    counters: RwLock<HashMap<String, u64>>,
    gauges: RwLock<HashMap<String, f64>>,
    histograms: RwLock<HashMap<String, Histogram>>,
    start_time: Instant,
}

impl MetricsCollector {
    /// Create an empty collector
    pub fn new() -> Self {
        Self {
            counters: RwLock::new(HashMap::new()),
            gauges: RwLock::new(HashMap::new()),
            histograms: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Add `value` to a counter
    pub fn increment_counter(&self, name: &str, value: u64) {
        let mut counters = self.counters.write();
        *counters.entry(name.to_string()).or_insert(0) += value;
    }

    /// Set a gauge value
    pub fn set_gauge(&self, name: &str, value: f64) {
        self.gauges.write().insert(name.to_string(), value);
    }

    /// Record one observation into a histogram
    pub fn record_histogram(&self, name: &str, value: f64) {
        let mut histograms = self.histograms.write();
        histograms
            .entry(name.to_string())
            .or_insert_with(Histogram::new)
            .record(value);
    }

    /// Get a counter value
    pub fn get_counter(&self, name: &str) -> Option<u64> {
        self.counters.read().get(name).copied()
    }

    /// Counter value, 0 when never incremented
    pub fn counter_or_zero(&self, name: &str) -> u64 {
        self.get_counter(name).unwrap_or(0)
    }

    /// Get a gauge value
    pub fn get_gauge(&self, name: &str) -> Option<f64> {
        self.gauges.read().get(name).copied()
    }

    /// Get histogram statistics
    pub fn get_histogram(&self, name: &str) -> Option<HistogramStats> {
        self.histograms.read().get(name).map(|h| h.stats())
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: SystemTime::now(),
            uptime: self.start_time.elapsed(),
            counters: self.counters.read().clone(),
            gauges: self.gauges.read().clone(),
            histograms: self
                .histograms
                .read()
                .iter()
                .map(|(k, v)| (k.clone(), v.stats()))
                .collect(),
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        self.counters.write().clear();
        self.gauges.write().clear();
        self.histograms.write().clear();
    }

    /// Export metrics in Prometheus text format, sorted by name
    pub fn export_prometheus(&self) -> String {
        let mut output = String::new();

        let counters: BTreeMap<String, u64> = self
            .counters
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        for (name, value) in &counters {
            output.push_str(&format!("# TYPE {} counter\n", name));
            output.push_str(&format!("{} {}\n", name, value));
        }

        let gauges: BTreeMap<String, f64> = self
            .gauges
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        for (name, value) in &gauges {
            output.push_str(&format!("# TYPE {} gauge\n", name));
            output.push_str(&format!("{} {}\n", name, value));
        }

        let histograms: BTreeMap<String, HistogramStats> = self
            .histograms
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.stats()))
            .collect();
        for (name, stats) in &histograms {
            output.push_str(&format!("# TYPE {} summary\n", name));
            output.push_str(&format!("{}_count {}\n", name, stats.count));
            output.push_str(&format!("{}_sum {}\n", name, stats.sum));
            output.push_str(&format!("{}{{quantile=\"0.5\"}} {}\n", name, stats.p50));
            output.push_str(&format!("{}{{quantile=\"0.95\"}} {}\n", name, stats.p95));
            output.push_str(&format!("{}{{quantile=\"0.99\"}} {}\n", name, stats.p99));
        }

        output
    }

    /// Export metrics as JSON
    pub fn export_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.snapshot())
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Histogram for tracking value distributions
struct Histogram {
    values: Vec<f64>,
    min: f64,
    max: f64,
    sum: f64,
}

impl Histogram {
    fn new() -> Self {
        Self {
            values: Vec::new(),
            min: f64::MAX,
            max: f64::MIN,
            sum: 0.0,
        }
    }

    fn record(&mut self, value: f64) {
        self.values.push(value);
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value;
    }

    fn stats(&self) -> HistogramStats {
        if self.values.is_empty() {
            return HistogramStats::default();
        }

        let count = self.values.len();
        let mean = self.sum / count as f64;

        let mut sorted = self.values.clone();
        sorted.sort_by(f64::total_cmp);

        HistogramStats {
            count: count as u64,
            sum: self.sum,
            min: self.min,
            max: self.max,
            mean,
            p50: percentile(&sorted, 0.50),
            p95: percentile(&sorted, 0.95),
            p99: percentile(&sorted, 0.99),
        }
    }
}

/// Inclusive percentile of already sorted values (p=0 first, p=1 last)
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let index = ((sorted_values.len() - 1) as f64 * p) as usize;
    sorted_values[index.min(sorted_values.len() - 1)]
}

/// Histogram statistics computed from recorded observations
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HistogramStats {
    /// Total number of observations
    pub count: u64,
    /// Sum of all observations
    pub sum: f64,
    /// Minimum observed value
    pub min: f64,
    /// Maximum observed value
    pub max: f64,
    /// Arithmetic mean of observations
    pub mean: f64,
    /// 50th percentile (median)
    pub p50: f64,
    /// 95th percentile
    pub p95: f64,
    /// 99th percentile
    pub p99: f64,
}

/// Point-in-time snapshot of all collected metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// When this snapshot was taken
    pub timestamp: SystemTime,
    /// Collector age at snapshot time
    pub uptime: Duration,
    /// Counter values (monotonically increasing)
    pub counters: HashMap<String, u64>,
    /// Gauge values (current state)
    pub gauges: HashMap<String, f64>,
    /// Histogram statistics
    pub histograms: HashMap<String, HistogramStats>,
}

pub mod metric_names {
    //! Metric names used by the delivery subsystem.

    /// Key events handed to a channel
    pub const KEY_EVENTS_PUBLISHED: &str = "input_key_events_published_total";
    /// Touch and pointer events handed to a channel
    pub const MOTION_EVENTS_PUBLISHED: &str = "input_motion_events_published_total";
    /// Finished signals read back from clients
    pub const FINISHED_SIGNALS: &str = "input_finished_signals_total";

    /// Events acknowledged as consumed
    pub const EVENTS_CONSUMED: &str = "input_events_consumed_total";
    /// Events acknowledged as not consumed
    pub const EVENTS_NOT_CONSUMED: &str = "input_events_not_consumed_total";
    /// Events dropped because the channel was full
    pub const EVENTS_BLOCKED: &str = "input_events_blocked_total";
    /// Events dropped because the client was gone
    pub const EVENTS_FAILED_PEER_GONE: &str = "input_events_failed_peer_gone_total";
    /// Events never acknowledged in time
    pub const EVENTS_FAILED_TIMED_OUT: &str = "input_events_failed_timed_out_total";
    /// Events outstanding when their surface went away
    pub const EVENTS_FAILED_SURFACE_GONE: &str = "input_events_failed_surface_gone_total";

    /// Event timestamp to acknowledgement, milliseconds
    pub const DELIVERY_LATENCY_MS: &str = "input_delivery_latency_ms";
    /// Transfers alive
    pub const TRANSFERS_ACTIVE: &str = "input_transfers_active";
}

/// Timer helper for measuring durations
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
