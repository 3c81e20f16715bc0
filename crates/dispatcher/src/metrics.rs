//! Sink metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use contracts::PublishedRecord;

/// Metrics for a single sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Records waiting in the sink queues
    queue_len: AtomicUsize,
    /// Frames written
    frames_written: AtomicU64,
    /// Calibration records written
    calibrations_written: AtomicU64,
    /// Total write failures
    failure_count: AtomicU64,
    /// Frames dropped because the frame queue was full
    dropped_count: AtomicU64,
}

impl SinkMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    /// Total successful writes, all ports
    pub fn write_count(&self) -> u64 {
        self.frames_written() + self.calibrations_written.load(Ordering::Relaxed)
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written.load(Ordering::Relaxed)
    }

    /// Count a successful write of `record`
    pub fn record_written(&self, record: &PublishedRecord) {
        let counter = match record {
            PublishedRecord::Frame(_) => &self.frames_written,
            PublishedRecord::Intrinsics(_) | PublishedRecord::Extrinsics(_) => {
                &self.calibrations_written
            }
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    pub fn inc_dropped_count(&self) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            frames_written: self.frames_written(),
            calibrations_written: self.calibrations_written.load(Ordering::Relaxed),
            failure_count: self.failure_count(),
            dropped_count: self.dropped_count(),
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub frames_written: u64,
    pub calibrations_written: u64,
    pub failure_count: u64,
    pub dropped_count: u64,
}

impl MetricsSnapshot {
    pub fn write_count(&self) -> u64 {
        self.frames_written + self.calibrations_written
    }
}
