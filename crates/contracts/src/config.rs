//! BridgeConfig - Config Loader output
//!
//! Initial camera state, image source, publish cadence, sinks and scripted
//! reconfiguration requests.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

use crate::{DEFAULT_HEIGHT, DEFAULT_HFOV, DEFAULT_WIDTH};

/// Complete bridge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BridgeConfig {
    /// Initial state of the calibration / frame core
    #[validate(nested)]
    pub camera: CameraConfig,

    /// Image source
    #[validate(nested)]
    pub source: SourceConfig,

    /// Publish cycle cadence
    #[validate(nested)]
    pub publish: PublishConfig,

    /// Output routing
    #[validate(nested)]
    pub sinks: Vec<SinkConfig>,

    /// Out-of-band reconfiguration requests, applied in `after_ms` order
    pub requests: Vec<ScheduledRequest>,
}

/// Initial camera state
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CameraConfig {
    #[validate(range(min = 1))]
    pub width: u16,

    #[validate(range(min = 1))]
    pub height: u16,

    /// Horizontal field of view (radians)
    pub hfov: f32,

    /// Distortion coefficients
    pub distortion: [f32; 5],

    /// Extrinsic pose (tx, ty, tz, rx, ry, rz)
    pub extrinsics: [f32; 6],

    /// Upper bound on frame storage (bytes); unlimited when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_frame_bytes: Option<usize>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            hfov: DEFAULT_HFOV,
            distortion: [0.0; 5],
            extrinsics: [0.0; 6],
            max_frame_bytes: None,
        }
    }
}

/// Image source configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SourceConfig {
    /// Transport locator (topic) of the image stream
    #[validate(length(min = 1))]
    pub locator: String,

    /// Connect as soon as the bridge is up
    pub connect_on_start: bool,

    /// In-process source parameters
    #[validate(nested)]
    pub mock: MockSourceConfig,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            locator: default_locator(),
            connect_on_start: true,
            mock: MockSourceConfig::default(),
        }
    }
}

fn default_locator() -> String {
    "~/camera/link/camera/image".to_string()
}

/// In-process source parameters
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MockSourceConfig {
    /// Emission frequency (Hz)
    #[validate(range(exclusive_min = 0.0))]
    pub frequency_hz: f64,

    /// Geometry of emitted frames (may differ from the camera's)
    #[validate(range(min = 1))]
    pub width: u16,

    #[validate(range(min = 1))]
    pub height: u16,
}

impl Default for MockSourceConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 30.0,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

/// Publish cycle cadence
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PublishConfig {
    /// Scheduler tick (milliseconds)
    #[validate(range(min = 1))]
    pub period_ms: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self { period_ms: 5 }
    }
}

/// Sink output configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SinkConfig {
    /// Sink name
    #[validate(length(min = 1))]
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Per-sink queue capacity
    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1))]
    pub queue_capacity: usize,

    /// Sink-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    16
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Structured log line per record
    Log,
    /// PNG per frame + JSON lines for calibration
    File,
    /// UDP datagram per record
    Network,
}

/// Request scheduled relative to bridge start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledRequest {
    /// Delay after start (milliseconds)
    pub after_ms: u64,

    #[serde(flatten)]
    pub request: ControlRequest,
}

/// Out-of-band reconfiguration request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ControlRequest {
    /// Subscribe to the source (configured locator when `None`)
    Connect {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        locator: Option<String>,
    },
    /// Drop the subscription
    Disconnect,
    /// Change image geometry
    SetFormat { width: u16, height: u16 },
    /// Change horizontal field of view (radians)
    SetHfov { hfov: f32 },
    /// Replace distortion coefficients
    SetDistortion { distortion: [f32; 5] },
    /// Replace extrinsic pose
    SetExtrinsics { extrinsics: [f32; 6] },
}

impl ControlRequest {
    /// Operation name (used for logging/metrics)
    pub fn op_name(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Disconnect => "disconnect",
            Self::SetFormat { .. } => "set_format",
            Self::SetHfov { .. } => "set_hfov",
            Self::SetDistortion { .. } => "set_distortion",
            Self::SetExtrinsics { .. } => "set_extrinsics",
        }
    }
}
