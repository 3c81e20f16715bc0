//! Publish metrics
//!
//! Prometheus recording helpers plus an in-memory aggregator used for the
//! end-of-run summary.

use contracts::{FrameRecord, Timestamp};
use metrics::{counter, gauge, histogram};

/// Record one published frame
///
/// `latency_ms` is the delay between capture and publication.
pub fn record_frame_published(frame: &FrameRecord, latency_ms: f64) {
    histogram!("camera_bridge_publish_latency_ms").record(latency_ms);
    gauge!("camera_bridge_last_frame_stamp_seconds").set(frame.timestamp.as_secs_f64());
    gauge!("camera_bridge_published_width").set(f64::from(frame.width));
    gauge!("camera_bridge_published_height").set(f64::from(frame.height));
}

/// Record the connection state and active frame length
pub fn record_bridge_state(started: bool, frame_bytes: usize) {
    gauge!("camera_bridge_connected").set(if started { 1.0 } else { 0.0 });
    gauge!("camera_bridge_frame_bytes").set(frame_bytes as f64);
}

/// Record cumulative sink counters
pub fn record_sink_totals(sink_name: &str, written: u64, dropped: u64, failures: u64) {
    let sink = sink_name.to_string();
    counter!("camera_bridge_sink_written_total", "sink" => sink.clone()).absolute(written);
    counter!("camera_bridge_sink_dropped_total", "sink" => sink.clone()).absolute(dropped);
    counter!("camera_bridge_sink_failures_total", "sink" => sink).absolute(failures);
}

/// Publish statistics aggregator
#[derive(Debug, Clone, Default)]
pub struct PublishStats {
    /// Frames published
    pub frames: u64,
    /// Distinct geometry runs seen on the frame port
    pub geometry_changes: u64,
    /// Capture-to-publish latency (ms)
    pub latency_ms: RunningStats,
    /// Published frame sizes (bytes)
    pub frame_bytes: RunningStats,
    /// Interval between consecutive capture stamps (ms)
    pub capture_interval_ms: RunningStats,
    last_geometry: Option<(u16, u16)>,
    last_stamp: Option<Timestamp>,
}

fn millis_between(earlier: Timestamp, later: Timestamp) -> f64 {
    (later.as_secs_f64() - earlier.as_secs_f64()) * 1000.0
}

impl PublishStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for a published frame; returns its latency in milliseconds
    pub fn update(&mut self, frame: &FrameRecord, now: Timestamp) -> f64 {
        self.frames += 1;

        let geometry = (frame.width, frame.height);
        if self.last_geometry.is_some_and(|g| g != geometry) {
            self.geometry_changes += 1;
        }
        self.last_geometry = Some(geometry);

        if let Some(previous) = self.last_stamp {
            self.capture_interval_ms
                .push(millis_between(previous, frame.timestamp));
        }
        self.last_stamp = Some(frame.timestamp);

        let latency = millis_between(frame.timestamp, now).max(0.0);
        self.latency_ms.push(latency);
        self.frame_bytes.push(frame.pixels.len() as f64);
        latency
    }

    /// Generate summary report
    pub fn summary(&self) -> PublishSummary {
        PublishSummary {
            frames: self.frames,
            geometry_changes: self.geometry_changes,
            latency_ms: StatsSummary::from(&self.latency_ms),
            frame_bytes: StatsSummary::from(&self.frame_bytes),
            capture_interval_ms: StatsSummary::from(&self.capture_interval_ms),
        }
    }

    /// Reset statistics
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Publish summary
#[derive(Debug, Clone, Default)]
pub struct PublishSummary {
    pub frames: u64,
    pub geometry_changes: u64,
    pub latency_ms: StatsSummary,
    pub frame_bytes: StatsSummary,
    pub capture_interval_ms: StatsSummary,
}

impl std::fmt::Display for PublishSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Publish Summary ===")?;
        writeln!(f, "Frames published: {}", self.frames)?;
        writeln!(f, "Geometry changes: {}", self.geometry_changes)?;
        writeln!(f, "Latency (ms): {}", self.latency_ms)?;
        writeln!(f, "Frame size (bytes): {}", self.frame_bytes)?;
        writeln!(f, "Capture interval (ms): {}", self.capture_interval_ms)?;
        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
