//! # Frame Bridge
//!
//! Core of the camera bridge: a shared frame buffer filled by a transport
//! callback and drained by a periodic publish cycle, plus the calibration model
//! and the runtime reconfiguration operations.
//!
//! ## Contexts
//! - ingest: [`IngestPath`], invoked on the transport's own thread
//! - periodic: [`PublishCycle`] and the [`CameraBridge`] operations
//!
//! Both share one [`FrameBuffer`]; its single mutex guards pixels, geometry,
//! the new-frame flag, the capture time and the started flag together.
//!
//! ## Usage
//!
//! ```ignore
//! let bridge = CameraBridge::new(&config.camera, transport, output)?;
//! bridge.connect("~/camera/link/camera/image");
//! let mut cycle = bridge.publish_cycle()?;
//! loop {
//!     cycle.tick()?;
//!     std::thread::sleep(period);
//! }
//! ```

mod bridge;
mod buffer;
mod calibration;
mod error;
mod ingest;
mod memory;
mod metrics;
mod publish;

pub use bridge::{CameraBridge, ConnectOutcome, DisconnectOutcome, RequestOutcome};
pub use buffer::{FrameBuffer, FrameState, Geometry, IngestOutcome, ResizeOutcome};
pub use calibration::{compute_intrinsics, focal_length, CalibrationModel};
pub use error::{BridgeError, Result};
pub use ingest::IngestPath;
pub use memory::MemoryOutput;
pub use metrics::{BridgeMetrics, MetricsSnapshot};
pub use publish::{CycleState, PublishCycle, Yield};
