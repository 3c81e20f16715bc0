//! Bridge counters
//!
//! Every increment updates an in-process atomic (for snapshots and tests) and
//! the matching `metrics` counter (for the Prometheus exporter, when installed).

use std::sync::atomic::{AtomicU64, Ordering};

use metrics::{counter, gauge};

/// Counters shared by the ingest path, the publish cycle and the ops
#[derive(Debug, Default)]
pub struct BridgeMetrics {
    /// Callbacks delivered by the transport
    frames_received: AtomicU64,
    /// Frames stored in the buffer
    frames_ingested: AtomicU64,
    /// Stored frames replaced before being published
    frames_overwritten: AtomicU64,
    /// Frames dropped for a length mismatch
    size_mismatches: AtomicU64,
    /// Frames dropped because the bridge was not started
    not_started_drops: AtomicU64,
    /// Frames committed to the output channel
    frames_published: AtomicU64,
    /// Output channel rejections
    publish_failures: AtomicU64,
    /// Allocation failures (reformat or publish)
    oom_events: AtomicU64,
    /// Reconfiguration operations applied
    reconfigurations: AtomicU64,
    /// Failed subscriptions
    connect_failures: AtomicU64,
}

impl BridgeMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_ingested(&self) {
        self.frames_ingested.fetch_add(1, Ordering::Relaxed);
        counter!("camera_bridge_frames_ingested_total").increment(1);
    }

    /// Active frame length after a (re)format
    pub fn set_frame_bytes(&self, length: usize) {
        gauge!("camera_bridge_frame_bytes").set(length as f64);
    }

    pub fn inc_overwritten(&self) {
        self.frames_overwritten.fetch_add(1, Ordering::Relaxed);
        counter!("camera_bridge_frames_overwritten_total").increment(1);
    }

    pub fn inc_size_mismatch(&self) {
        self.size_mismatches.fetch_add(1, Ordering::Relaxed);
        counter!("camera_bridge_frames_dropped_total", "reason" => "size_mismatch").increment(1);
    }

    pub fn inc_not_started(&self) {
        self.not_started_drops.fetch_add(1, Ordering::Relaxed);
        counter!("camera_bridge_frames_dropped_total", "reason" => "not_started").increment(1);
    }

    pub fn inc_published(&self) {
        self.frames_published.fetch_add(1, Ordering::Relaxed);
        counter!("camera_bridge_frames_published_total").increment(1);
    }

    pub fn inc_publish_failure(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
        counter!("camera_bridge_publish_failures_total").increment(1);
    }

    pub fn inc_oom(&self) {
        self.oom_events.fetch_add(1, Ordering::Relaxed);
        counter!("camera_bridge_out_of_memory_total").increment(1);
    }

    pub fn inc_reconfiguration(&self, op: &'static str) {
        self.reconfigurations.fetch_add(1, Ordering::Relaxed);
        counter!("camera_bridge_reconfigurations_total", "op" => op).increment(1);
    }

    pub fn inc_connect_failure(&self) {
        self.connect_failures.fetch_add(1, Ordering::Relaxed);
        counter!("camera_bridge_connect_failures_total").increment(1);
    }

    pub fn frames_published(&self) -> u64 {
        self.frames_published.load(Ordering::Relaxed)
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_ingested: self.frames_ingested.load(Ordering::Relaxed),
            frames_overwritten: self.frames_overwritten.load(Ordering::Relaxed),
            size_mismatches: self.size_mismatches.load(Ordering::Relaxed),
            not_started_drops: self.not_started_drops.load(Ordering::Relaxed),
            frames_published: self.frames_published.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            oom_events: self.oom_events.load(Ordering::Relaxed),
            reconfigurations: self.reconfigurations.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of bridge counters (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames_received: u64,
    pub frames_ingested: u64,
    pub frames_overwritten: u64,
    pub size_mismatches: u64,
    pub not_started_drops: u64,
    pub frames_published: u64,
    pub publish_failures: u64,
    pub oom_events: u64,
    pub reconfigurations: u64,
    pub connect_failures: u64,
}

impl MetricsSnapshot {
    /// Frames received but never stored
    pub fn frames_dropped(&self) -> u64 {
        self.size_mismatches + self.not_started_drops
    }
}
