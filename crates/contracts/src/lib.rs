//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the camera bridge.
//! Business crates depend on this crate only, never on each other's internals.
//!
//! ## Records
//! - [`FrameRecord`]: one published image (geometry, pixels, capture time)
//! - [`Intrinsics`] / [`Extrinsics`]: the calibration published alongside frames
//!
//! ## Seams
//! - [`FrameTransport`]: the push-based image source (callback on an arbitrary thread)
//! - [`OutputChannel`]: where the core writes records; implementations own the storage
//! - [`DataSink`]: downstream consumers behind the dispatcher

mod config;
mod error;
mod output;
mod record;
mod sink;
mod transport;

pub use config::*;
pub use error::*;
pub use output::{OutputChannel, PublishedFrame, PublishedRecord};
pub use record::*;
pub use sink::*;
pub use transport::{FrameCallback, FrameTransport, SubscriptionId};
