//! Transport callback: validate and store arriving frames

use std::sync::Arc;

use contracts::{FrameCallback, Timestamp};
use tracing::{trace, warn};

use crate::buffer::{FrameBuffer, IngestOutcome};
use crate::metrics::BridgeMetrics;

/// Ingest side of the bridge
///
/// Runs on whatever thread the transport delivers on. The started check and
/// the copy happen under one lock acquisition, so once a disconnect has
/// cleared `started` no later callback can store a frame.
#[derive(Debug, Clone)]
pub struct IngestPath {
    buffer: Arc<FrameBuffer>,
    metrics: Arc<BridgeMetrics>,
}

impl IngestPath {
    pub fn new(buffer: Arc<FrameBuffer>, metrics: Arc<BridgeMetrics>) -> Self {
        Self { buffer, metrics }
    }

    /// Offer one frame; never fails, drops are logged and counted
    pub fn on_frame(&self, bytes: &[u8], captured_at: Timestamp) -> IngestOutcome {
        self.metrics.inc_received();

        let outcome = {
            let mut state = self.buffer.lock();
            if state.is_started() {
                state.ingest(bytes, captured_at)
            } else {
                IngestOutcome::NotStarted
            }
        };

        match outcome {
            IngestOutcome::Accepted { overwrote } => {
                self.metrics.inc_ingested();
                if overwrote {
                    self.metrics.inc_overwritten();
                    trace!(
                        sec = captured_at.sec,
                        nsec = captured_at.nsec,
                        "unpublished frame replaced"
                    );
                }
            }
            IngestOutcome::SizeMismatch { expected, actual } => {
                self.metrics.inc_size_mismatch();
                warn!(expected, actual, "image size mismatch, frame dropped");
            }
            IngestOutcome::NotStarted => {
                self.metrics.inc_not_started();
                trace!("frame received while not started, dropped");
            }
        }

        outcome
    }

    /// Wrap this path as a transport callback
    pub fn callback(&self) -> FrameCallback {
        let path = self.clone();
        Arc::new(move |bytes: &[u8], captured_at: Timestamp| {
            path.on_frame(bytes, captured_at);
        })
    }
}
