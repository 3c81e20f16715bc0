//! DispatchOutput - the bridge's output channel
//!
//! Turns port writes into [`PublishedRecord`]s and queues them for the
//! dispatcher without blocking the caller. Only frames can be dropped.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use contracts::{
    ContractError, Extrinsics, FrameRecord, Intrinsics, OutputChannel, PublishedFrame,
    PublishedRecord,
};

use crate::queue::{record_queue, RecordReceiver, RecordSender, SendOutcome};

/// Create an output channel and the receiver the dispatcher consumes
///
/// `frame_capacity` bounds queued frames only and must be at least 1.
pub fn dispatch_channel(frame_capacity: usize) -> (DispatchOutput, RecordReceiver) {
    let (tx, rx) = record_queue(frame_capacity);
    (DispatchOutput::new(tx), rx)
}

/// Output channel feeding the dispatcher
///
/// A full frame queue drops the frame (counted); a closed queue is an error.
#[derive(Debug)]
pub struct DispatchOutput {
    tx: RecordSender,
    next_sequence: AtomicU64,
    dropped: AtomicU64,
}

impl DispatchOutput {
    pub fn new(tx: RecordSender) -> Self {
        Self {
            tx,
            next_sequence: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Frames dropped because the dispatcher queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Frames accepted so far
    pub fn frames_sent(&self) -> u64 {
        self.next_sequence.load(Ordering::Relaxed)
    }

    fn send(&self, record: PublishedRecord) -> Result<(), ContractError> {
        match self.tx.try_send(record) {
            SendOutcome::Queued => Ok(()),
            SendOutcome::FrameDropped => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("dispatcher queue full, frame dropped");
                Ok(())
            }
            SendOutcome::Closed => Err(ContractError::output_closed("dispatcher")),
        }
    }
}

impl OutputChannel for DispatchOutput {
    fn write_frame(&self, frame: &FrameRecord) -> Result<(), ContractError> {
        if self.tx.is_closed() {
            return Err(ContractError::output_closed("dispatcher"));
        }
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        debug!(sequence, bytes = frame.pixels.len(), "frame queued for dispatch");
        self.send(PublishedRecord::Frame(PublishedFrame::from_record(
            sequence, frame,
        )))
    }

    fn write_intrinsics(&self, intrinsics: &Intrinsics) -> Result<(), ContractError> {
        self.send(PublishedRecord::Intrinsics(*intrinsics))
    }

    fn write_extrinsics(&self, extrinsics: &Extrinsics) -> Result<(), ContractError> {
        self.send(PublishedRecord::Extrinsics(*extrinsics))
    }
}
