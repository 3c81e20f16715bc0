//! Run statistics.

use std::time::Duration;

use dispatcher::MetricsSnapshot as SinkSnapshot;
use frame_bridge::MetricsSnapshot as BridgeSnapshot;
use observability::PublishSummary;

/// Statistics from a bridge run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Frames handed to the output channel
    pub frames_published: u64,

    /// Publish steps that failed (storage exhaustion)
    pub publish_errors: u64,

    /// Scripted requests applied
    pub requests_applied: u64,

    /// Scripted requests rejected by the bridge
    pub requests_failed: u64,

    /// Frames generated by the source
    pub frames_emitted: u64,

    /// Records dropped because the dispatcher queue was full
    pub dispatch_dropped: u64,

    /// Total duration of the run
    pub duration: Duration,

    /// Bridge counters at shutdown
    pub bridge: BridgeSnapshot,

    /// Publish latency and frame size statistics
    pub publish: PublishSummary,

    /// Per-sink counters after flush
    pub sinks: Vec<(String, SinkSnapshot)>,
}

impl RunStats {
    /// Published frames per second
    pub fn fps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.frames_published as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Share of received frames that were never stored, as a percentage
    pub fn drop_rate(&self) -> f64 {
        if self.bridge.frames_received > 0 {
            (self.bridge.frames_dropped() as f64 / self.bridge.frames_received as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Run Statistics ===\n");

        println!("Overview");
        println!("   Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   Frames published: {}", self.frames_published);
        println!("   FPS: {:.2}", self.fps());
        println!("   Source frames emitted: {}", self.frames_emitted);
        println!(
            "   Requests: {} applied, {} failed",
            self.requests_applied, self.requests_failed
        );

        println!("\nBridge");
        println!("   Received: {}", self.bridge.frames_received);
        println!("   Ingested: {}", self.bridge.frames_ingested);
        println!("   Overwritten before publish: {}", self.bridge.frames_overwritten);
        println!(
            "   Dropped: {} ({:.2}%), size mismatch {}, not started {}",
            self.bridge.frames_dropped(),
            self.drop_rate(),
            self.bridge.size_mismatches,
            self.bridge.not_started_drops
        );
        println!("   Publish failures: {}", self.bridge.publish_failures);
        println!("   Out of memory: {}", self.bridge.oom_events);
        println!("   Reconfigurations: {}", self.bridge.reconfigurations);
        println!("   Dispatch queue drops: {}", self.dispatch_dropped);

        println!("\n{}", self.publish);

        if !self.sinks.is_empty() {
            println!("Sinks");
            for (name, m) in &self.sinks {
                println!(
                    "   {}: {} frames, {} calibrations, {} dropped, {} failed",
                    name, m.frames_written, m.calibrations_written, m.dropped_count, m.failure_count
                );
            }
        }

        println!();
    }
}
