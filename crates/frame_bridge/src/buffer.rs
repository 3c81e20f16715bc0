//! Shared frame buffer
//!
//! One mutex guards the pixel bytes together with the geometry they were
//! written for, the new-frame flag, the capture time and the `started` flag.
//! Capacity only ever grows; a reformat to a smaller size keeps the storage.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use contracts::{FrameRecord, Timestamp, BYTES_PER_PIXEL};

use crate::error::{BridgeError, Result};

/// Declared frame geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Geometry {
    pub width: u16,
    pub height: u16,
}

impl Geometry {
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    /// `width * height * 3`, `None` when it does not fit in `usize`
    pub fn byte_len(&self) -> Option<usize> {
        usize::from(self.width)
            .checked_mul(usize::from(self.height))?
            .checked_mul(usize::from(BYTES_PER_PIXEL))
    }

    fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Result of offering a frame to the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Frame stored; `overwrote` is set when an unpublished frame was replaced
    Accepted { overwrote: bool },
    /// Payload length disagrees with the declared geometry; nothing changed
    SizeMismatch { expected: usize, actual: usize },
    /// Bridge not started; nothing changed
    NotStarted,
}

/// Result of a geometry change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeOutcome {
    /// New active length in bytes
    pub length: usize,
    /// An unpublished frame of the previous geometry was dropped
    pub discarded_pending: bool,
}

/// Ensure `buf` can hold `len` bytes without reallocating later.
///
/// Never shrinks. Fails without touching `buf` when the allocation (or the
/// configured budget) cannot cover `len`.
pub(crate) fn reserve_grow_only(buf: &mut Vec<u8>, len: usize, limit: Option<usize>) -> Result<()> {
    if limit.is_some_and(|max| len > max) {
        return Err(BridgeError::out_of_memory(len));
    }
    if len > buf.capacity() {
        buf.try_reserve_exact(len - buf.len())
            .map_err(|_| BridgeError::out_of_memory(len))?;
    }
    Ok(())
}

/// State guarded by the [`FrameBuffer`] mutex
pub struct FrameState {
    buffer: Vec<u8>,
    length: usize,
    geometry: Geometry,
    has_new_frame: bool,
    timestamp: Timestamp,
    started: bool,
    limit: Option<usize>,
}

impl fmt::Debug for FrameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameState")
            .field("geometry", &self.geometry)
            .field("length", &self.length)
            .field("capacity", &self.buffer.capacity())
            .field("has_new_frame", &self.has_new_frame)
            .field("started", &self.started)
            .finish()
    }
}

impl FrameState {
    /// Change the declared geometry.
    ///
    /// Atomic: on error the previous geometry, length and contents are kept.
    /// A pending frame is discarded when the geometry actually changes, so a
    /// publish can never pair old pixels with new dimensions.
    pub fn resize(&mut self, geometry: Geometry) -> Result<ResizeOutcome> {
        if geometry.is_empty() {
            return Err(BridgeError::InvalidFormat {
                width: geometry.width,
                height: geometry.height,
            });
        }
        let length = geometry
            .byte_len()
            .ok_or_else(|| BridgeError::out_of_memory(usize::MAX))?;

        reserve_grow_only(&mut self.buffer, length, self.limit)?;

        let discarded_pending = geometry != self.geometry && self.has_new_frame;
        if discarded_pending {
            self.has_new_frame = false;
        }
        self.geometry = geometry;
        self.length = length;

        Ok(ResizeOutcome {
            length,
            discarded_pending,
        })
    }

    /// Store a frame if its length matches the declared geometry
    pub fn ingest(&mut self, bytes: &[u8], captured_at: Timestamp) -> IngestOutcome {
        if bytes.len() != self.length {
            return IngestOutcome::SizeMismatch {
                expected: self.length,
                actual: bytes.len(),
            };
        }

        let overwrote = self.has_new_frame;
        // capacity >= length is guaranteed by resize: no reallocation here
        self.buffer.clear();
        self.buffer.extend_from_slice(bytes);
        self.timestamp = captured_at;
        self.has_new_frame = true;

        IngestOutcome::Accepted { overwrote }
    }

    /// Copy the pending frame into `out` and clear the flag.
    ///
    /// Returns `Ok(false)` when there is nothing to publish. If `out` cannot
    /// grow, the pending frame stays pending and `out` is left untouched.
    pub fn take_into(&mut self, out: &mut FrameRecord) -> Result<bool> {
        if !self.has_new_frame {
            return Ok(false);
        }

        let pixels = &self.buffer[..self.length];
        reserve_grow_only(&mut out.pixels, pixels.len(), None)?;
        out.pixels.clear();
        out.pixels.extend_from_slice(pixels);
        out.width = self.geometry.width;
        out.height = self.geometry.height;
        out.bpp = BYTES_PER_PIXEL;
        out.timestamp = self.timestamp;

        self.has_new_frame = false;
        Ok(true)
    }

    /// Drop an unpublished frame, returns whether there was one
    pub fn discard_pending(&mut self) -> bool {
        std::mem::replace(&mut self.has_new_frame, false)
    }

    /// Set the connection flag, returns the previous value
    pub fn set_started(&mut self, started: bool) -> bool {
        std::mem::replace(&mut self.started, started)
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn has_new_frame(&self) -> bool {
        self.has_new_frame
    }

    /// Started and holding an unpublished frame
    pub fn is_ready(&self) -> bool {
        self.started && self.has_new_frame
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Active byte count
    pub fn length(&self) -> usize {
        self.length
    }

    /// Reserved byte count (never decreases)
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Capture time of the last accepted frame
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Bytes of the last accepted frame (empty before the first one)
    pub fn pixels(&self) -> &[u8] {
        &self.buffer[..self.buffer.len().min(self.length)]
    }
}

/// Shared, resizable pixel buffer
///
/// Written by the ingest context, read by the publish cycle, resized by
/// reconfiguration. Shared as `Arc<FrameBuffer>`.
#[derive(Debug)]
pub struct FrameBuffer {
    state: Mutex<FrameState>,
}

impl FrameBuffer {
    /// Allocate a buffer for `geometry`
    pub fn new(geometry: Geometry) -> Result<Self> {
        Self::with_limit(geometry, None)
    }

    /// Allocate a buffer whose capacity may never exceed `limit` bytes
    pub fn with_limit(geometry: Geometry, limit: Option<usize>) -> Result<Self> {
        let mut state = FrameState {
            buffer: Vec::new(),
            length: 0,
            geometry: Geometry::new(0, 0),
            has_new_frame: false,
            timestamp: Timestamp::default(),
            started: false,
            limit,
        };
        state.resize(geometry)?;
        Ok(Self {
            state: Mutex::new(state),
        })
    }

    /// Lock the shared state
    ///
    /// A panic while holding the lock cannot leave the state torn (every
    /// mutation is completed before any fallible step), so poisoning is ignored.
    pub fn lock(&self) -> MutexGuard<'_, FrameState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// See [`FrameState::resize`]
    pub fn resize(&self, width: u16, height: u16) -> Result<ResizeOutcome> {
        self.lock().resize(Geometry::new(width, height))
    }

    /// See [`FrameState::ingest`]
    pub fn ingest(&self, bytes: &[u8], captured_at: Timestamp) -> IngestOutcome {
        self.lock().ingest(bytes, captured_at)
    }

    /// See [`FrameState::take_into`]
    pub fn take_if_new_into(&self, out: &mut FrameRecord) -> Result<bool> {
        self.lock().take_into(out)
    }

    /// Copy out the pending frame, if any
    pub fn take_if_new(&self) -> Result<Option<FrameRecord>> {
        let mut record = FrameRecord::default();
        Ok(self.take_if_new_into(&mut record)?.then_some(record))
    }

    pub fn geometry(&self) -> Geometry {
        self.lock().geometry()
    }

    pub fn length(&self) -> usize {
        self.lock().length()
    }

    pub fn has_new_frame(&self) -> bool {
        self.lock().has_new_frame()
    }

    pub fn is_started(&self) -> bool {
        self.lock().is_started()
    }

    pub fn is_ready(&self) -> bool {
        self.lock().is_ready()
    }
}
