//! LogSink - logs record summaries via tracing

use contracts::{ContractError, DataSink, PublishedRecord};
use tracing::{info, instrument};

/// Sink that logs record summaries for debugging
pub struct LogSink {
    name: String,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_summary(&self, record: &PublishedRecord) {
        match record {
            PublishedRecord::Frame(frame) => info!(
                sink = %self.name,
                sequence = frame.sequence,
                width = frame.width,
                height = frame.height,
                bytes = frame.pixels.len(),
                stamp = frame.timestamp.as_secs_f64(),
                "Frame published"
            ),
            PublishedRecord::Intrinsics(k) => info!(
                sink = %self.name,
                focal_x = k.focal_x,
                focal_y = k.focal_y,
                center_x = k.center_x,
                center_y = k.center_y,
                distortion = ?k.distortion,
                "Intrinsic calibration"
            ),
            PublishedRecord::Extrinsics(e) => info!(
                sink = %self.name,
                translation = ?[e.tx, e.ty, e.tz],
                rotation = ?[e.rx, e.ry, e.rz],
                "Extrinsic calibration"
            ),
        }
    }
}

impl DataSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, record),
        fields(sink = %self.name, port = record.port())
    )]
    async fn write(&mut self, record: &PublishedRecord) -> Result<(), ContractError> {
        self.log_summary(record);
        Ok(())
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}
