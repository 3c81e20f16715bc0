//! Output records
//!
//! Records written by the bridge to its output channel: the frame port and the
//! two calibration ports.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Bytes per pixel of every frame handled by the bridge (packed RGB8)
pub const BYTES_PER_PIXEL: u8 = 3;

/// Default horizontal field of view (radians), about 60 degrees
pub const DEFAULT_HFOV: f32 = 1.047;

/// Default frame width
pub const DEFAULT_WIDTH: u16 = 320;

/// Default frame height
pub const DEFAULT_HEIGHT: u16 = 240;

/// Capture timestamp, split as seconds + nanoseconds since the Unix epoch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub sec: i64,
    pub nsec: i64,
}

impl Timestamp {
    /// Build from seconds + nanoseconds
    pub const fn new(sec: i64, nsec: i64) -> Self {
        Self { sec, nsec }
    }

    /// Current wall-clock time
    pub fn now() -> Self {
        Self::from(SystemTime::now())
    }

    /// Seconds as f64 (for logging)
    pub fn as_secs_f64(&self) -> f64 {
        self.sec as f64 + self.nsec as f64 * 1e-9
    }
}

impl From<SystemTime> for Timestamp {
    fn from(t: SystemTime) -> Self {
        let since_epoch = t.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
        Self {
            sec: since_epoch.as_secs() as i64,
            nsec: i64::from(since_epoch.subsec_nanos()),
        }
    }
}

/// Frame port record
///
/// The pixel storage belongs to whoever owns the record. The bridge keeps one
/// record as its staging port and only ever grows `pixels`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub width: u16,
    pub height: u16,

    /// Always [`BYTES_PER_PIXEL`]
    pub bpp: u8,

    #[serde(with = "serde_bytes")]
    pub pixels: Vec<u8>,

    pub timestamp: Timestamp,
}

impl FrameRecord {
    /// Empty record declared for the given geometry
    pub fn with_geometry(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            bpp: BYTES_PER_PIXEL,
            pixels: Vec::new(),
            timestamp: Timestamp::default(),
        }
    }

    /// Byte count implied by the declared geometry
    pub fn expected_len(&self) -> usize {
        usize::from(self.width) * usize::from(self.height) * usize::from(self.bpp)
    }
}

/// Intrinsic calibration port record (pinhole + 5 distortion coefficients)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub focal_x: f32,
    pub focal_y: f32,
    pub center_x: f32,
    pub center_y: f32,
    pub skew: f32,
    pub distortion: [f32; 5],
}

/// Extrinsic calibration port record
///
/// Translation followed by a 3-angle rotation; the convention is the consumer's.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Extrinsics {
    pub tx: f32,
    pub ty: f32,
    pub tz: f32,
    pub rx: f32,
    pub ry: f32,
    pub rz: f32,
}

impl From<[f32; 6]> for Extrinsics {
    fn from(v: [f32; 6]) -> Self {
        Self {
            tx: v[0],
            ty: v[1],
            tz: v[2],
            rx: v[3],
            ry: v[4],
            rz: v[5],
        }
    }
}

impl From<Extrinsics> for [f32; 6] {
    fn from(e: Extrinsics) -> Self {
        [e.tx, e.ty, e.tz, e.rx, e.ry, e.rz]
    }
}
