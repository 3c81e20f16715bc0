//! `info` command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};
use contracts::{Extrinsics, Intrinsics};
use frame_bridge::{CameraBridge, MemoryOutput};
use serde::Serialize;
use tracing::info;
use transport::MockTransport;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Initial camera state for JSON output
#[derive(Debug, Serialize)]
struct CameraInfo {
    width: u16,
    height: u16,
    hfov: f32,
    buffer_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_frame_bytes: Option<usize>,
    intrinsics: Intrinsics,
    extrinsics: Extrinsics,
    locator: String,
    sinks: Vec<SinkInfo>,
}

#[derive(Debug, Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration for info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let camera = describe(&config)?;

    if args.json {
        let json =
            serde_json::to_string_pretty(&camera).context("Failed to serialize camera info")?;
        println!("{}", json);
    } else {
        print_info(&camera);
    }

    Ok(())
}

/// Build the bridge offline and read back what it would publish at startup
fn describe(config: &contracts::BridgeConfig) -> Result<CameraInfo> {
    let output = Arc::new(MemoryOutput::new());
    let bridge = CameraBridge::new(
        &config.camera,
        Arc::new(MockTransport::with_defaults()),
        Arc::clone(&output) as Arc<dyn contracts::OutputChannel>,
    )
    .map_err(CliError::from)?;

    let calibration = bridge.calibration();
    let geometry = bridge.geometry();

    Ok(CameraInfo {
        width: geometry.width,
        height: geometry.height,
        hfov: calibration.hfov(),
        buffer_bytes: bridge.buffer().length(),
        max_frame_bytes: config.camera.max_frame_bytes,
        intrinsics: output
            .last_intrinsics()
            .unwrap_or(*calibration.intrinsics()),
        extrinsics: output
            .last_extrinsics()
            .unwrap_or(*calibration.extrinsics()),
        locator: config.source.locator.clone(),
        sinks: config
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type).to_lowercase(),
            })
            .collect(),
    })
}

fn print_info(camera: &CameraInfo) {
    println!("\n=== Camera ===\n");
    println!("Geometry: {}x{}", camera.width, camera.height);
    println!("HFOV: {:.4} rad", camera.hfov);
    println!("Frame buffer: {} bytes", camera.buffer_bytes);
    if let Some(limit) = camera.max_frame_bytes {
        println!("Storage limit: {} bytes", limit);
    }
    println!("Locator: {}", camera.locator);

    let k = &camera.intrinsics;
    println!("\nIntrinsics:");
    println!("  fx={:.3} fy={:.3}", k.focal_x, k.focal_y);
    println!("  cx={:.3} cy={:.3} skew={:.3}", k.center_x, k.center_y, k.skew);
    println!("  distortion={:?}", k.distortion);

    let e = &camera.extrinsics;
    println!("\nExtrinsics:");
    println!("  t=({:.3}, {:.3}, {:.3})", e.tx, e.ty, e.tz);
    println!("  r=({:.3}, {:.3}, {:.3})", e.rx, e.ry, e.rz);

    if !camera.sinks.is_empty() {
        println!("\nSinks ({}):", camera.sinks.len());
        for sink in &camera.sinks {
            println!("  - {} ({})", sink.name, sink.sink_type);
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::BridgeConfig;

    #[test]
    fn test_describe_default_camera() {
        let camera = describe(&BridgeConfig::default()).unwrap();
        assert_eq!((camera.width, camera.height), (320, 240));
        assert_eq!(camera.buffer_bytes, 320 * 240 * 3);
        assert!((camera.intrinsics.center_x - 160.0).abs() < 1e-6);
        assert_eq!(camera.intrinsics.focal_x, camera.intrinsics.focal_y);
    }

    #[test]
    fn test_describe_rejects_storage_limit() {
        let mut config = BridgeConfig::default();
        config.camera.max_frame_bytes = Some(1024);
        assert!(describe(&config).is_err());
    }
}
