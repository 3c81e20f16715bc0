//! Split record queue
//!
//! Frames travel through a bounded queue and are dropped when it is full;
//! a newer frame always follows. Intrinsics and extrinsics are state, so
//! they travel through an unbounded queue and are never dropped. Receivers
//! drain calibration first, so a sink never writes a frame with a stale
//! calibration still queued behind it.

use tokio::sync::mpsc;

use contracts::PublishedRecord;

/// Result of [`RecordSender::try_send`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Queued,
    /// The frame queue was full
    FrameDropped,
    /// The receiver is gone
    Closed,
}

/// Create a queue holding at most `frame_capacity` frames
///
/// `frame_capacity` must be at least 1.
pub fn record_queue(frame_capacity: usize) -> (RecordSender, RecordReceiver) {
    let (frames_tx, frames_rx) = mpsc::channel(frame_capacity);
    let (calibration_tx, calibration_rx) = mpsc::unbounded_channel();
    (
        RecordSender {
            frames: frames_tx,
            calibration: calibration_tx,
        },
        RecordReceiver {
            frames: frames_rx,
            calibration: calibration_rx,
        },
    )
}

#[derive(Debug, Clone)]
pub struct RecordSender {
    frames: mpsc::Sender<PublishedRecord>,
    calibration: mpsc::UnboundedSender<PublishedRecord>,
}

impl RecordSender {
    /// Queue a record without waiting
    pub fn try_send(&self, record: PublishedRecord) -> SendOutcome {
        match record {
            PublishedRecord::Frame(_) => match self.frames.try_send(record) {
                Ok(()) => SendOutcome::Queued,
                Err(mpsc::error::TrySendError::Full(_)) => SendOutcome::FrameDropped,
                Err(mpsc::error::TrySendError::Closed(_)) => SendOutcome::Closed,
            },
            PublishedRecord::Intrinsics(_) | PublishedRecord::Extrinsics(_) => {
                match self.calibration.send(record) {
                    Ok(()) => SendOutcome::Queued,
                    Err(_) => SendOutcome::Closed,
                }
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.frames.is_closed()
    }

    /// Frames currently waiting
    pub fn queued_frames(&self) -> usize {
        self.frames.max_capacity() - self.frames.capacity()
    }
}

#[derive(Debug)]
pub struct RecordReceiver {
    frames: mpsc::Receiver<PublishedRecord>,
    calibration: mpsc::UnboundedReceiver<PublishedRecord>,
}

impl RecordReceiver {
    /// Next record, calibration first
    ///
    /// Returns `None` once every sender is dropped and both queues are empty.
    pub async fn recv(&mut self) -> Option<PublishedRecord> {
        tokio::select! {
            biased;
            Some(record) = self.calibration.recv() => Some(record),
            Some(record) = self.frames.recv() => Some(record),
            else => None,
        }
    }

    /// Next record if one is already queued, calibration first
    pub fn try_recv(&mut self) -> Option<PublishedRecord> {
        self.calibration
            .try_recv()
            .or_else(|_| self.frames.try_recv())
            .ok()
    }

    /// Records waiting in both queues
    pub fn len(&self) -> usize {
        self.frames.len() + self.calibration.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
