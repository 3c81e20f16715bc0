//! Wait/Publish cycle
//!
//! Cooperative two-state loop driven by a periodic scheduler. Each call to
//! [`PublishCycle::step`] does a bounded amount of work and returns.

use std::sync::Arc;

use contracts::{FrameRecord, OutputChannel};
use tracing::{debug, warn};

use crate::buffer::{reserve_grow_only, FrameBuffer};
use crate::error::{BridgeError, Result};
use crate::metrics::BridgeMetrics;

/// Cycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Wait,
    Publish,
}

/// What the scheduler should do after a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Yield {
    /// Nothing to do; call again on the next period
    Pause,
    /// Call again immediately
    Continue,
}

/// Periodic publisher
///
/// Owns the frame port record; its pixel storage is reused across publishes
/// and only ever grows.
pub struct PublishCycle {
    buffer: Arc<FrameBuffer>,
    output: Arc<dyn OutputChannel>,
    metrics: Arc<BridgeMetrics>,
    state: CycleState,
    port: FrameRecord,
}

impl PublishCycle {
    pub fn new(
        buffer: Arc<FrameBuffer>,
        output: Arc<dyn OutputChannel>,
        metrics: Arc<BridgeMetrics>,
    ) -> Result<Self> {
        let geometry = buffer.geometry();
        let mut port = FrameRecord::with_geometry(geometry.width, geometry.height);
        let length = geometry
            .byte_len()
            .ok_or_else(|| BridgeError::out_of_memory(usize::MAX))?;
        reserve_grow_only(&mut port.pixels, length, None).inspect_err(|e| {
            metrics.inc_oom();
            warn!(error = %e, "frame port could not be sized");
        })?;

        Ok(Self {
            buffer,
            output,
            metrics,
            state: CycleState::Wait,
            port,
        })
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Last record committed (or staged) on the frame port
    pub fn port(&self) -> &FrameRecord {
        &self.port
    }

    /// Advance the state machine by one transition.
    ///
    /// Only an allocation failure of the port record is returned; the pending
    /// frame then stays pending and the cycle is back in `Wait`.
    pub fn step(&mut self) -> Result<Yield> {
        match self.state {
            CycleState::Wait => {
                if self.buffer.is_ready() {
                    self.state = CycleState::Publish;
                    Ok(Yield::Continue)
                } else {
                    Ok(Yield::Pause)
                }
            }
            CycleState::Publish => {
                self.state = CycleState::Wait;
                self.publish().map(|_| Yield::Continue)
            }
        }
    }

    /// Run steps until the cycle pauses or publishes once.
    ///
    /// Picks up from whatever state a previous [`step`](Self::step) left.
    /// Returns whether a frame was committed.
    pub fn tick(&mut self) -> Result<bool> {
        loop {
            match self.state {
                CycleState::Wait => {
                    if self.step()? == Yield::Pause {
                        return Ok(false);
                    }
                }
                CycleState::Publish => {
                    self.state = CycleState::Wait;
                    return self.publish();
                }
            }
        }
    }

    fn publish(&mut self) -> Result<bool> {
        let copied = self.buffer.take_if_new_into(&mut self.port).inspect_err(|e| {
            self.metrics.inc_oom();
            warn!(error = %e, "frame port could not grow, frame kept pending");
        })?;
        if !copied {
            return Ok(false);
        }

        if let Err(e) = self.output.write_frame(&self.port) {
            self.metrics.inc_publish_failure();
            warn!(error = %e, "frame publish failed");
            return Ok(false);
        }

        self.metrics.inc_published();
        debug!(
            width = self.port.width,
            height = self.port.height,
            sec = self.port.timestamp.sec,
            nsec = self.port.timestamp.nsec,
            "frame published"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Geometry;
    use crate::memory::MemoryOutput;
    use contracts::Timestamp;

    fn cycle(geometry: Geometry) -> (PublishCycle, Arc<FrameBuffer>, Arc<MemoryOutput>) {
        let buffer = Arc::new(FrameBuffer::new(geometry).unwrap());
        let output = Arc::new(MemoryOutput::new());
        let metrics = Arc::new(BridgeMetrics::new());
        let cycle = PublishCycle::new(Arc::clone(&buffer), output.clone(), metrics).unwrap();
        (cycle, buffer, output)
    }

    #[test]
    fn test_wait_pauses_when_not_started() {
        let (mut cycle, buffer, output) = cycle(Geometry::new(1, 1));
        buffer.ingest(&[1, 2, 3], Timestamp::default());

        assert_eq!(cycle.step().unwrap(), Yield::Pause);
        assert_eq!(cycle.state(), CycleState::Wait);
        assert_eq!(output.frame_writes(), 0);
    }

    #[test]
    fn test_wait_pauses_without_new_frame() {
        let (mut cycle, buffer, _) = cycle(Geometry::new(1, 1));
        buffer.lock().set_started(true);
        assert_eq!(cycle.step().unwrap(), Yield::Pause);
    }

    #[test]
    fn test_wait_then_publish() {
        let (mut cycle, buffer, output) = cycle(Geometry::new(2, 1));
        buffer.lock().set_started(true);
        buffer.ingest(&[9u8; 6], Timestamp::new(4, 2));

        assert_eq!(cycle.step().unwrap(), Yield::Continue);
        assert_eq!(cycle.state(), CycleState::Publish);
        assert_eq!(cycle.step().unwrap(), Yield::Continue);
        assert_eq!(cycle.state(), CycleState::Wait);

        let frame = output.last_frame().unwrap();
        assert_eq!((frame.width, frame.height, frame.bpp), (2, 1, 3));
        assert_eq!(frame.pixels, vec![9u8; 6]);
        assert_eq!(frame.timestamp, Timestamp::new(4, 2));

        assert_eq!(cycle.step().unwrap(), Yield::Pause);
    }

    #[test]
    fn test_tick_publishes_each_frame_once() {
        let (mut cycle, buffer, output) = cycle(Geometry::new(1, 1));
        buffer.lock().set_started(true);

        buffer.ingest(&[1, 1, 1], Timestamp::new(1, 0));
        assert!(cycle.tick().unwrap());
        assert!(!cycle.tick().unwrap());

        buffer.ingest(&[2, 2, 2], Timestamp::new(2, 0));
        assert!(cycle.tick().unwrap());
        assert_eq!(output.frame_writes(), 2);
    }

    #[test]
    fn test_tick_resumes_after_manual_step() {
        let (mut cycle, buffer, output) = cycle(Geometry::new(1, 1));
        buffer.lock().set_started(true);
        buffer.ingest(&[5, 5, 5], Timestamp::new(3, 0));

        assert_eq!(cycle.step().unwrap(), Yield::Continue);
        assert_eq!(cycle.state(), CycleState::Publish);

        assert!(cycle.tick().unwrap());
        assert_eq!(cycle.state(), CycleState::Wait);
        assert_eq!(output.frame_writes(), 1);
        assert_eq!(output.last_frame().unwrap().pixels, vec![5u8; 3]);

        assert!(!cycle.tick().unwrap());
        assert_eq!(output.frame_writes(), 1);
    }

    #[test]
    fn test_port_sized_at_construction() {
        let (cycle, buffer, output) = cycle(Geometry::new(320, 240));
        assert_eq!(buffer.length(), 320 * 240 * 3);
        assert!(cycle.port().pixels.capacity() >= buffer.length());
        assert!(cycle.port().pixels.is_empty());
        assert_eq!(output.frame_writes(), 0);
    }

    #[test]
    fn test_output_failure_returns_to_wait() {
        let buffer = Arc::new(FrameBuffer::new(Geometry::new(1, 1)).unwrap());
        let output = Arc::new(MemoryOutput::new());
        let metrics = Arc::new(BridgeMetrics::new());
        let mut cycle =
            PublishCycle::new(Arc::clone(&buffer), output.clone(), metrics.clone()).unwrap();
        buffer.lock().set_started(true);
        output.set_fail_writes(true);

        buffer.ingest(&[1, 1, 1], Timestamp::default());
        assert!(!cycle.tick().unwrap());
        assert_eq!(cycle.state(), CycleState::Wait);
        assert_eq!(metrics.snapshot().publish_failures, 1);
        assert_eq!(metrics.snapshot().frames_published, 0);
    }

    #[test]
    fn test_port_tracks_reformat() {
        let (mut cycle, buffer, output) = cycle(Geometry::new(4, 4));
        buffer.lock().set_started(true);

        buffer.resize(2, 3).unwrap();
        buffer.ingest(&[7u8; 18], Timestamp::default());
        assert!(cycle.tick().unwrap());

        let frame = output.last_frame().unwrap();
        assert_eq!((frame.width, frame.height), (2, 3));
        assert_eq!(frame.pixels.len(), 18);
        assert_eq!(cycle.port().expected_len(), 18);
    }
}
