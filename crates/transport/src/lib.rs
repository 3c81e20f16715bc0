//! # Transport
//!
//! Frame sources implementing [`contracts::FrameTransport`].
//!
//! - [`MockTransport`]: in-process generator, one delivery thread per
//!   subscription. Used for development runs and tests without a simulator.

pub mod error;
pub mod mock;

pub use error::{Result, TransportError};
pub use mock::{pattern_frame, MockTransport, MockTransportConfig};
