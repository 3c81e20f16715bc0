//! Dispatcher - main loop for fan-out to sinks

use std::collections::HashSet;

use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use contracts::{PublishedRecord, SinkConfig, SinkType};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::MetricsSnapshot;
use crate::queue::RecordReceiver;
use crate::sinks::{FileSink, LogSink, NetworkSink};

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Sink configurations
    pub sinks: Vec<SinkConfig>,
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    input_rx: RecordReceiver,
}

impl DispatcherBuilder {
    pub fn new(config: DispatcherConfig, input_rx: RecordReceiver) -> Self {
        Self { config, input_rx }
    }

    /// Build the dispatcher, starting one worker per sink
    #[instrument(name = "dispatcher_builder_build", skip(self))]
    pub async fn build(self) -> Result<Dispatcher, DispatcherError> {
        let handles = Self::initialize_handles(&self.config).await?;

        Ok(Dispatcher {
            handles,
            input_rx: self.input_rx,
        })
    }

    #[instrument(
        name = "dispatcher_initialize_handles",
        skip(config),
        fields(sink_count = config.sinks.len())
    )]
    async fn initialize_handles(
        config: &DispatcherConfig,
    ) -> Result<Vec<SinkHandle>, DispatcherError> {
        let mut names = HashSet::new();
        let mut handles = Vec::with_capacity(config.sinks.len());
        for sink_config in &config.sinks {
            if !names.insert(sink_config.name.as_str()) {
                return Err(DispatcherError::DuplicateSink {
                    name: sink_config.name.clone(),
                });
            }
            if sink_config.queue_capacity == 0 {
                return Err(DispatcherError::ZeroQueueCapacity {
                    name: sink_config.name.clone(),
                });
            }
            handles.push(create_sink_handle(sink_config).await?);
        }
        Ok(handles)
    }
}

/// Create a SinkHandle from configuration
#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
async fn create_sink_handle(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    match config.sink_type {
        SinkType::Log => {
            let sink = LogSink::new(&config.name);
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
        SinkType::Network => {
            let sink = NetworkSink::from_params(&config.name, &config.params)
                .await
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
    }
}

/// Fans published records out to sinks
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
    input_rx: RecordReceiver,
}

impl Dispatcher {
    /// Create a dispatcher with custom sink handles (for testing)
    pub fn with_handles(
        handles: Vec<SinkHandle>,
        input_rx: RecordReceiver,
    ) -> Self {
        Self { handles, input_rx }
    }

    /// Get metrics for all sinks
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Run the dispatcher main loop
    ///
    /// Returns the final per-sink metrics once the input channel is closed
    /// and every sink has been flushed.
    #[instrument(name = "dispatcher_run", skip(self))]
    pub async fn run(mut self) -> Vec<(String, MetricsSnapshot)> {
        info!(sinks = self.handles.len(), "Dispatcher started");

        let mut record_count: u64 = 0;

        while let Some(record) = self.input_rx.recv().await {
            record_count += 1;
            self.dispatch_record(record);

            if record_count.is_multiple_of(100) {
                debug!(records = record_count, "Dispatcher progress");
            }
        }

        info!(
            records = record_count,
            "Dispatcher input closed, shutting down"
        );

        let handles = self.handles;
        let metrics: Vec<_> = handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().clone()))
            .collect();
        for handle in handles {
            handle.shutdown().await;
        }

        info!("Dispatcher shutdown complete");
        metrics
            .into_iter()
            .map(|(name, m)| (name, m.snapshot()))
            .collect()
    }

    /// Spawn the dispatcher as a background task
    pub fn spawn(self) -> JoinHandle<Vec<(String, MetricsSnapshot)>> {
        tokio::spawn(self.run())
    }

    fn dispatch_record(&self, record: PublishedRecord) {
        if let Some((last, rest)) = self.handles.split_last() {
            for handle in rest {
                handle.offer(record.clone());
            }
            last.offer(record);
        }
    }
}

/// Convenience function to create a dispatcher from sink configs
#[instrument(name = "dispatcher_create", skip(sink_configs, input_rx))]
pub async fn create_dispatcher(
    sink_configs: Vec<SinkConfig>,
    input_rx: RecordReceiver,
) -> Result<Dispatcher, DispatcherError> {
    let config = DispatcherConfig {
        sinks: sink_configs,
    };
    DispatcherBuilder::new(config, input_rx).build().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Extrinsics, FrameRecord, OutputChannel};
    use std::collections::HashMap;

    use crate::output::dispatch_channel;
    use crate::queue::{record_queue, SendOutcome};

    #[tokio::test]
    async fn test_dispatcher_fanout() {
        let (output, input_rx) = dispatch_channel(10);

        let handles = vec![
            SinkHandle::spawn(LogSink::new("sink1"), 10),
            SinkHandle::spawn(LogSink::new("sink2"), 10),
        ];
        let handle = Dispatcher::with_handles(handles, input_rx).spawn();

        let mut frame = FrameRecord::with_geometry(1, 1);
        frame.pixels = vec![0, 0, 0];
        for _ in 0..3 {
            output.write_frame(&frame).unwrap();
        }
        output.write_extrinsics(&Extrinsics::default()).unwrap();
        drop(output);

        let metrics = handle.await.unwrap();
        assert_eq!(metrics.len(), 2);
        for (_, m) in metrics {
            assert_eq!(m.frames_written, 3);
            assert_eq!(m.calibrations_written, 1);
        }
    }

    #[tokio::test]
    async fn test_create_dispatcher_from_config() {
        let (input_tx, input_rx) = record_queue(10);

        let configs = vec![SinkConfig {
            name: "test_log".to_string(),
            sink_type: SinkType::Log,
            queue_capacity: 50,
            params: HashMap::new(),
        }];

        let dispatcher = create_dispatcher(configs, input_rx).await.unwrap();
        let handle = dispatcher.spawn();

        let outcome = input_tx.try_send(PublishedRecord::Extrinsics(Extrinsics::default()));
        assert_eq!(outcome, SendOutcome::Queued);

        drop(input_tx);
        let metrics = handle.await.unwrap();
        assert_eq!(metrics[0].0, "test_log");
        assert_eq!(metrics[0].1.write_count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_sink_names_rejected() {
        let (_tx, input_rx) = record_queue(1);
        let sink = SinkConfig {
            name: "dup".to_string(),
            sink_type: SinkType::Log,
            queue_capacity: 1,
            params: HashMap::new(),
        };

        let result = create_dispatcher(vec![sink.clone(), sink], input_rx).await;
        assert!(matches!(result, Err(DispatcherError::DuplicateSink { .. })));
    }

    #[tokio::test]
    async fn test_zero_queue_capacity_rejected() {
        let (_tx, input_rx) = record_queue(1);
        let sink = SinkConfig {
            name: "unbuffered".to_string(),
            sink_type: SinkType::Log,
            queue_capacity: 0,
            params: HashMap::new(),
        };

        let result = create_dispatcher(vec![sink], input_rx).await;
        assert!(matches!(
            result,
            Err(DispatcherError::ZeroQueueCapacity { name }) if name == "unbuffered"
        ));
    }
}
