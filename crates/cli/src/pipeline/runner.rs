//! Pipeline runner - wires source, bridge and dispatcher together and drives
//! the publish cycle.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{BridgeConfig, FrameTransport, OutputChannel, ScheduledRequest, Timestamp};
use dispatcher::{create_dispatcher, dispatch_channel};
use frame_bridge::{CameraBridge, ConnectOutcome, PublishCycle, RequestOutcome};
use observability::{record_bridge_state, record_frame_published, record_sink_totals, PublishStats};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use transport::{MockTransport, MockTransportConfig};

use super::RunStats;
use crate::error::CliError;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Validated bridge configuration (CLI overrides applied)
    pub config: BridgeConfig,

    /// Stop after this many published frames (None = unlimited)
    pub max_frames: Option<u64>,

    /// Stop after this long (None = no timeout)
    pub timeout: Option<Duration>,

    /// Dispatcher input queue capacity
    pub buffer_size: usize,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Scripted requests ordered by due time
struct RequestSchedule {
    pending: VecDeque<ScheduledRequest>,
}

impl RequestSchedule {
    fn new(mut requests: Vec<ScheduledRequest>) -> Self {
        // stable: requests sharing a due time keep file order
        requests.sort_by_key(|r| r.after_ms);
        Self {
            pending: requests.into(),
        }
    }

    fn pop_due(&mut self, elapsed: Duration) -> Option<ScheduledRequest> {
        let due = self
            .pending
            .front()
            .is_some_and(|r| Duration::from_millis(r.after_ms) <= elapsed);
        if due {
            self.pending.pop_front()
        } else {
            None
        }
    }
}

/// Main pipeline
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until a limit is reached or `shutdown` resolves
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<RunStats> {
        let start_time = Instant::now();
        let cfg = &self.config.config;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
        }

        let source = Arc::new(
            MockTransport::new(MockTransportConfig::from(&cfg.source.mock))
                .map_err(CliError::from)?,
        );
        let (output, input_rx) = dispatch_channel(self.config.buffer_size);
        let output = Arc::new(output);

        let dispatcher = create_dispatcher(cfg.sinks.clone(), input_rx)
            .await
            .map_err(CliError::from)
            .context("Failed to create sinks")?;
        let dispatcher_task = dispatcher.spawn();

        let bridge = CameraBridge::new(
            &cfg.camera,
            Arc::clone(&source) as Arc<dyn FrameTransport>,
            Arc::clone(&output) as Arc<dyn OutputChannel>,
        )
        .map_err(CliError::from)?;

        info!(
            geometry = %bridge.geometry(),
            locator = %cfg.source.locator,
            period_ms = cfg.publish.period_ms,
            sinks = cfg.sinks.len(),
            requests = cfg.requests.len(),
            "Bridge initialized"
        );

        if cfg.source.connect_on_start {
            if let ConnectOutcome::Failed { reason } = bridge.connect(&cfg.source.locator) {
                warn!(reason = %reason, "Initial connect failed; waiting for a scripted connect");
            }
        }

        let mut cycle = bridge.publish_cycle().map_err(CliError::from)?;
        let mut stats = RunStats::default();
        let mut publish_stats = PublishStats::new();

        self.drive(
            &bridge,
            &mut cycle,
            &mut stats,
            &mut publish_stats,
            start_time,
            shutdown,
        )
        .await;

        bridge.disconnect();
        stats.bridge = bridge.metrics().snapshot();
        stats.dispatch_dropped = output.dropped();
        stats.frames_emitted = source.frames_emitted();
        stats.publish = publish_stats.summary();

        // the dispatcher drains once every handle on the output channel is gone
        drop(cycle);
        drop(bridge);
        drop(output);

        stats.sinks = dispatcher_task
            .await
            .context("Dispatcher task panicked")?;
        for (name, m) in &stats.sinks {
            record_sink_totals(name, m.write_count(), m.dropped_count, m.failure_count);
        }

        stats.duration = start_time.elapsed();
        Ok(stats)
    }

    async fn drive(
        &self,
        bridge: &CameraBridge,
        cycle: &mut PublishCycle,
        stats: &mut RunStats,
        publish_stats: &mut PublishStats,
        start_time: Instant,
        shutdown: impl Future<Output = ()>,
    ) {
        let cfg = &self.config.config;
        let mut schedule = RequestSchedule::new(cfg.requests.clone());
        let deadline = self.config.timeout.map(|t| start_time + t);

        let mut ticker = tokio::time::interval(Duration::from_millis(cfg.publish.period_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    warn!("Received shutdown signal, stopping bridge...");
                    break;
                }
                _ = ticker.tick() => {}
            }

            while let Some(scheduled) = schedule.pop_due(start_time.elapsed()) {
                apply_request(bridge, &scheduled, &cfg.source.locator, stats);
            }

            match cycle.tick() {
                Ok(true) => {
                    stats.frames_published += 1;
                    let latency_ms = publish_stats.update(cycle.port(), Timestamp::now());
                    record_frame_published(cycle.port(), latency_ms);
                }
                Ok(false) => {}
                Err(e) => {
                    stats.publish_errors += 1;
                    warn!(error = %e, "Publish step failed");
                }
            }
            record_bridge_state(bridge.is_started(), bridge.buffer().length());

            if self
                .config
                .max_frames
                .is_some_and(|max| stats.frames_published >= max)
            {
                info!(frames = stats.frames_published, "Frame limit reached");
                break;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                info!("Timeout reached");
                break;
            }
        }
    }
}

fn apply_request(
    bridge: &CameraBridge,
    scheduled: &ScheduledRequest,
    default_locator: &str,
    stats: &mut RunStats,
) {
    let op = scheduled.request.op_name();
    match bridge.handle(&scheduled.request, default_locator) {
        Ok(RequestOutcome::Connect(ConnectOutcome::Failed { reason })) => {
            stats.requests_failed += 1;
            warn!(op, after_ms = scheduled.after_ms, reason = %reason, "Scripted request failed");
        }
        Ok(outcome) => {
            stats.requests_applied += 1;
            debug!(op, after_ms = scheduled.after_ms, ?outcome, "Scripted request applied");
        }
        Err(e) => {
            stats.requests_failed += 1;
            warn!(op, after_ms = scheduled.after_ms, error = %e, "Scripted request rejected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ControlRequest;

    fn scheduled(after_ms: u64, request: ControlRequest) -> ScheduledRequest {
        ScheduledRequest { after_ms, request }
    }

    #[test]
    fn test_schedule_orders_by_due_time() {
        let mut schedule = RequestSchedule::new(vec![
            scheduled(200, ControlRequest::Disconnect),
            scheduled(100, ControlRequest::SetHfov { hfov: 1.0 }),
            scheduled(100, ControlRequest::SetHfov { hfov: 2.0 }),
        ]);

        assert!(schedule.pop_due(Duration::from_millis(50)).is_none());
        let first = schedule.pop_due(Duration::from_millis(150)).unwrap();
        assert_eq!(first.request, ControlRequest::SetHfov { hfov: 1.0 });
        let second = schedule.pop_due(Duration::from_millis(150)).unwrap();
        assert_eq!(second.request, ControlRequest::SetHfov { hfov: 2.0 });
        assert!(schedule.pop_due(Duration::from_millis(150)).is_none());
        assert!(schedule.pop_due(Duration::from_millis(200)).is_some());
    }

    #[tokio::test]
    async fn test_run_stops_at_frame_limit() {
        let mut config = BridgeConfig::default();
        config.camera.width = 16;
        config.camera.height = 8;
        config.source.mock.width = 16;
        config.source.mock.height = 8;
        config.source.mock.frequency_hz = 200.0;
        config.publish.period_ms = 2;
        config.requests = vec![scheduled(
            0,
            ControlRequest::SetExtrinsics {
                extrinsics: [1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            },
        )];

        let pipeline = Pipeline::new(PipelineConfig {
            config,
            max_frames: Some(3),
            timeout: Some(Duration::from_secs(10)),
            buffer_size: 16,
            metrics_port: None,
        });

        let stats = pipeline
            .run_until(std::future::pending::<()>())
            .await
            .unwrap();
        assert_eq!(stats.frames_published, 3);
        assert_eq!(stats.requests_applied, 1);
        assert_eq!(stats.bridge.frames_published, 3);
        assert_eq!(stats.bridge.size_mismatches, 0);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let mut config = BridgeConfig::default();
        config.source.connect_on_start = false;

        let pipeline = Pipeline::new(PipelineConfig {
            config,
            max_frames: None,
            timeout: None,
            buffer_size: 4,
            metrics_port: None,
        });

        let stats = pipeline
            .run_until(tokio::time::sleep(Duration::from_millis(30)))
            .await
            .unwrap();
        assert_eq!(stats.frames_published, 0);
        assert_eq!(stats.bridge.frames_received, 0);
    }
}
