//! Bridge error types

use thiserror::Error;

/// Errors a caller of the bridge must check
///
/// Transient conditions (size mismatches, redundant connect/disconnect) are
/// not errors; they are logged and counted.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Pixel storage could not grow to the required length
    #[error("unable to allocate frame memory ({requested} bytes)")]
    OutOfMemory { requested: usize },

    /// Geometry with a zero dimension
    #[error("invalid image format {width}x{height}")]
    InvalidFormat { width: u16, height: u16 },

    /// Field of view outside (0, pi)
    #[error("invalid horizontal field of view {hfov} rad")]
    InvalidFieldOfView { hfov: f32 },

    /// Non-finite calibration value
    #[error("invalid {name}: {message}")]
    InvalidParameter { name: &'static str, message: String },
}

impl BridgeError {
    /// Create out-of-memory error
    pub fn out_of_memory(requested: usize) -> Self {
        Self::OutOfMemory { requested }
    }

    /// Create invalid parameter error
    pub fn invalid_parameter(name: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            message: message.into(),
        }
    }

    /// True for allocation failures
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, BridgeError>;
