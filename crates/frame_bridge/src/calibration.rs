//! Pinhole calibration model
//!
//! Intrinsics are derived from the declared geometry and the horizontal field
//! of view. Pixels are square, so `focal_y == focal_x`.

use std::f32::consts::PI;

use contracts::{Extrinsics, Intrinsics, DEFAULT_HEIGHT, DEFAULT_HFOV, DEFAULT_WIDTH};

use crate::buffer::Geometry;
use crate::error::{BridgeError, Result};

/// Focal length (pixels) of a pinhole camera `width` pixels wide seeing `hfov` radians
pub fn focal_length(width: u16, hfov: f32) -> f32 {
    let half_width = f64::from(width) / 2.0;
    (half_width / (f64::from(hfov) / 2.0).tan()) as f32
}

/// Compute the intrinsic record for a geometry, field of view and distortion
pub fn compute_intrinsics(geometry: Geometry, hfov: f32, distortion: [f32; 5]) -> Intrinsics {
    let focal = focal_length(geometry.width, hfov);
    Intrinsics {
        focal_x: focal,
        focal_y: focal,
        center_x: f32::from(geometry.width) / 2.0,
        center_y: f32::from(geometry.height) / 2.0,
        skew: 0.0,
        distortion,
    }
}

fn check_hfov(hfov: f32) -> Result<()> {
    if hfov.is_finite() && hfov > 0.0 && hfov < PI {
        Ok(())
    } else {
        Err(BridgeError::InvalidFieldOfView { hfov })
    }
}

fn check_finite(name: &'static str, values: &[f32]) -> Result<()> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(BridgeError::invalid_parameter(
            name,
            format!("element {index} is not finite"),
        )),
        None => Ok(()),
    }
}

/// Authoritative calibration state of the bridge
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationModel {
    geometry: Geometry,
    hfov: f32,
    intrinsics: Intrinsics,
    extrinsics: Extrinsics,
}

impl Default for CalibrationModel {
    fn default() -> Self {
        let geometry = Geometry::new(DEFAULT_WIDTH, DEFAULT_HEIGHT);
        Self {
            geometry,
            hfov: DEFAULT_HFOV,
            intrinsics: compute_intrinsics(geometry, DEFAULT_HFOV, [0.0; 5]),
            extrinsics: Extrinsics::default(),
        }
    }
}

impl CalibrationModel {
    /// Build a validated model
    pub fn new(
        geometry: Geometry,
        hfov: f32,
        distortion: [f32; 5],
        extrinsics: [f32; 6],
    ) -> Result<Self> {
        check_hfov(hfov)?;
        check_finite("distortion", &distortion)?;
        check_finite("extrinsics", &extrinsics)?;
        Ok(Self {
            geometry,
            hfov,
            intrinsics: compute_intrinsics(geometry, hfov, distortion),
            extrinsics: Extrinsics::from(extrinsics),
        })
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn hfov(&self) -> f32 {
        self.hfov
    }

    pub fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    pub fn extrinsics(&self) -> &Extrinsics {
        &self.extrinsics
    }

    /// Track a new geometry and recompute focal length and principal point
    pub fn set_geometry(&mut self, geometry: Geometry) -> &Intrinsics {
        self.geometry = geometry;
        self.recompute()
    }

    /// Change the field of view and recompute; rejected values leave the model unchanged
    pub fn set_hfov(&mut self, hfov: f32) -> Result<&Intrinsics> {
        check_hfov(hfov)?;
        self.hfov = hfov;
        Ok(self.recompute())
    }

    /// Replace the distortion coefficients only
    pub fn set_distortion(&mut self, distortion: [f32; 5]) -> Result<&Intrinsics> {
        check_finite("distortion", &distortion)?;
        self.intrinsics.distortion = distortion;
        Ok(&self.intrinsics)
    }

    /// Replace the extrinsic pose
    pub fn set_extrinsics(&mut self, pose: [f32; 6]) -> Result<&Extrinsics> {
        check_finite("extrinsics", &pose)?;
        self.extrinsics = Extrinsics::from(pose);
        Ok(&self.extrinsics)
    }

    fn recompute(&mut self) -> &Intrinsics {
        self.intrinsics = compute_intrinsics(self.geometry, self.hfov, self.intrinsics.distortion);
        &self.intrinsics
    }
}
