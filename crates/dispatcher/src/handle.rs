//! Per-sink worker
//!
//! Each sink owns a [`record_queue`] and a task draining it. A slow sink
//! only ever loses frames; every calibration update reaches it, ahead of
//! any frame still queued.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{DataSink, PublishedRecord};

use crate::metrics::SinkMetrics;
use crate::queue::{record_queue, RecordReceiver, RecordSender, SendOutcome};

pub struct SinkHandle {
    name: String,
    tx: RecordSender,
    metrics: Arc<SinkMetrics>,
    worker: JoinHandle<()>,
}

impl SinkHandle {
    /// Start a worker for `sink` holding at most `frame_capacity` frames
    pub fn spawn<S: DataSink + Send + 'static>(sink: S, frame_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = record_queue(frame_capacity);
        let metrics = Arc::new(SinkMetrics::new());
        let worker = tokio::spawn(sink_worker(sink, rx, Arc::clone(&metrics)));

        Self {
            name,
            tx,
            metrics,
            worker,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Hand a record to the worker without waiting
    ///
    /// Returns false when a frame was dropped or the worker is gone.
    pub fn offer(&self, record: PublishedRecord) -> bool {
        let port = record.port();
        match self.tx.try_send(record) {
            SendOutcome::Queued => {
                self.metrics.set_queue_len(self.tx.queued_frames());
                true
            }
            SendOutcome::FrameDropped => {
                self.metrics.inc_dropped_count();
                debug!(sink = %self.name, "sink behind, frame dropped");
                false
            }
            SendOutcome::Closed => {
                error!(sink = %self.name, port, "sink worker is gone");
                false
            }
        }
    }

    /// Let the worker drain what is queued, then flush and close the sink
    #[instrument(name = "sink_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            error!(error = ?e, "sink worker panicked");
        }
        let m = self.metrics.snapshot();
        if m.dropped_count > 0 {
            warn!(dropped = m.dropped_count, "sink dropped frames");
        }
        debug!(
            frames = m.frames_written,
            calibrations = m.calibrations_written,
            "sink stopped"
        );
    }
}

#[instrument(name = "sink_worker", skip_all, fields(sink = %sink.name()))]
async fn sink_worker<S: DataSink>(mut sink: S, mut rx: RecordReceiver, metrics: Arc<SinkMetrics>) {
    while let Some(record) = rx.recv().await {
        metrics.set_queue_len(rx.len());
        match sink.write(&record).await {
            Ok(()) => metrics.record_written(&record),
            Err(e) => {
                metrics.inc_failure_count();
                error!(port = record.port(), error = %e, "sink write failed");
            }
        }
    }

    if let Err(e) = sink.flush().await {
        error!(error = %e, "sink flush failed");
    }
    if let Err(e) = sink.close().await {
        error!(error = %e, "sink close failed");
    }
}
