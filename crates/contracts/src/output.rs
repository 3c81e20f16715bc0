//! OutputChannel trait - where the bridge publishes its records

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{ContractError, Extrinsics, FrameRecord, Intrinsics, Timestamp};

/// Output port storage
///
/// The bridge writes into implementations of this trait and never reads back.
/// Writes happen from the periodic context and must not block.
pub trait OutputChannel: Send + Sync {
    /// Commit a frame record
    fn write_frame(&self, frame: &FrameRecord) -> Result<(), ContractError>;

    /// Commit the intrinsic calibration
    fn write_intrinsics(&self, intrinsics: &Intrinsics) -> Result<(), ContractError>;

    /// Commit the extrinsic calibration
    fn write_extrinsics(&self, extrinsics: &Extrinsics) -> Result<(), ContractError>;
}

/// Immutable frame snapshot handed to sinks (pixels shared, not copied)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedFrame {
    /// Publish sequence number (monotonically increasing)
    pub sequence: u64,
    pub width: u16,
    pub height: u16,
    pub bpp: u8,
    pub pixels: Bytes,
    pub timestamp: Timestamp,
}

impl PublishedFrame {
    /// Snapshot a frame record
    pub fn from_record(sequence: u64, record: &FrameRecord) -> Self {
        Self {
            sequence,
            width: record.width,
            height: record.height,
            bpp: record.bpp,
            pixels: Bytes::copy_from_slice(&record.pixels),
            timestamp: record.timestamp,
        }
    }
}

/// Anything the bridge publishes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "port", rename_all = "snake_case")]
pub enum PublishedRecord {
    Frame(PublishedFrame),
    Intrinsics(Intrinsics),
    Extrinsics(Extrinsics),
}

impl PublishedRecord {
    /// Port name (used for logging/metrics)
    pub fn port(&self) -> &'static str {
        match self {
            Self::Frame(_) => "frame",
            Self::Intrinsics(_) => "intrinsics",
            Self::Extrinsics(_) => "extrinsics",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_published_frame_snapshot() {
        let mut record = FrameRecord::with_geometry(2, 1);
        record.pixels = vec![1, 2, 3, 4, 5, 6];
        record.timestamp = Timestamp::new(3, 4);

        let frame = PublishedFrame::from_record(7, &record);
        assert_eq!(frame.sequence, 7);
        assert_eq!(frame.pixels.as_ref(), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(frame.timestamp, Timestamp::new(3, 4));
    }

    #[test]
    fn test_record_port_tag() {
        let record = PublishedRecord::Extrinsics(Extrinsics::default());
        assert_eq!(record.port(), "extrinsics");

        let json = serde_json::to_string(&PublishedRecord::Intrinsics(Intrinsics::default()))
            .unwrap();
        assert!(json.contains("\"port\":\"intrinsics\""));
    }
}
