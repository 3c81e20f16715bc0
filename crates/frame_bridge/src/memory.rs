//! In-memory output channel
//!
//! Keeps the last record written on each port. Used by `info`, dry runs and
//! tests that need to observe what the core publishes.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use contracts::{ContractError, Extrinsics, FrameRecord, Intrinsics, OutputChannel};

#[derive(Debug, Default)]
struct Ports {
    frame: Option<FrameRecord>,
    intrinsics: Option<Intrinsics>,
    extrinsics: Option<Extrinsics>,
}

/// Output channel holding the latest value of every port
#[derive(Debug, Default)]
pub struct MemoryOutput {
    ports: Mutex<Ports>,
    frame_writes: AtomicU64,
    intrinsics_writes: AtomicU64,
    extrinsics_writes: AtomicU64,
    fail_writes: AtomicBool,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail (or succeed again)
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    pub fn last_frame(&self) -> Option<FrameRecord> {
        self.ports().frame.clone()
    }

    pub fn last_intrinsics(&self) -> Option<Intrinsics> {
        self.ports().intrinsics
    }

    pub fn last_extrinsics(&self) -> Option<Extrinsics> {
        self.ports().extrinsics
    }

    pub fn frame_writes(&self) -> u64 {
        self.frame_writes.load(Ordering::Relaxed)
    }

    pub fn intrinsics_writes(&self) -> u64 {
        self.intrinsics_writes.load(Ordering::Relaxed)
    }

    pub fn extrinsics_writes(&self) -> u64 {
        self.extrinsics_writes.load(Ordering::Relaxed)
    }

    fn ports(&self) -> MutexGuard<'_, Ports> {
        self.ports.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_open(&self) -> Result<(), ContractError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            Err(ContractError::output_closed("memory"))
        } else {
            Ok(())
        }
    }
}

impl OutputChannel for MemoryOutput {
    fn write_frame(&self, frame: &FrameRecord) -> Result<(), ContractError> {
        self.check_open()?;
        let mut ports = self.ports();
        match ports.frame.as_mut() {
            // reuse the stored allocation
            Some(stored) => stored.clone_from(frame),
            None => ports.frame = Some(frame.clone()),
        }
        self.frame_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn write_intrinsics(&self, intrinsics: &Intrinsics) -> Result<(), ContractError> {
        self.check_open()?;
        self.ports().intrinsics = Some(*intrinsics);
        self.intrinsics_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn write_extrinsics(&self, extrinsics: &Extrinsics) -> Result<(), ContractError> {
        self.check_open()?;
        self.ports().extrinsics = Some(*extrinsics);
        self.extrinsics_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
