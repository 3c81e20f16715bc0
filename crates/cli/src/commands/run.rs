//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{error, info};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let mut config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if let Some(ref locator) = args.locator {
        info!(locator = %locator, "Overriding source locator from CLI");
        config.source.locator = locator.clone();
    }
    if let Some(period_ms) = args.period_ms {
        info!(period_ms, "Overriding publish period from CLI");
        config.publish.period_ms = period_ms;
    }
    config_loader::ConfigLoader::validate(&config).context("Invalid CLI override")?;

    info!(
        width = config.camera.width,
        height = config.camera.height,
        hfov = config.camera.hfov,
        locator = %config.source.locator,
        sinks = config.sinks.len(),
        requests = config.requests.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        config,
        max_frames: (args.max_frames > 0).then_some(args.max_frames),
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        buffer_size: args.buffer_size.max(1),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    });

    info!("Starting bridge...");
    let stats = pipeline
        .run_until(shutdown_signal())
        .await
        .context("Bridge run failed")?;

    info!(
        frames_published = stats.frames_published,
        frames_dropped = stats.bridge.frames_dropped(),
        duration_secs = stats.duration.as_secs_f64(),
        fps = format!("{:.2}", stats.fps()),
        "Bridge stopped"
    );
    stats.print_summary();

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &contracts::BridgeConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Camera:");
    println!("  Geometry: {}x{}", config.camera.width, config.camera.height);
    println!("  HFOV: {:.4} rad", config.camera.hfov);
    println!("  Distortion: {:?}", config.camera.distortion);
    println!("  Extrinsics: {:?}", config.camera.extrinsics);
    if let Some(limit) = config.camera.max_frame_bytes {
        println!("  Frame storage limit: {} bytes", limit);
    }

    println!("\nSource:");
    println!("  Locator: {}", config.source.locator);
    println!("  Connect on start: {}", config.source.connect_on_start);
    println!(
        "  Mock: {}x{} @ {} Hz",
        config.source.mock.width, config.source.mock.height, config.source.mock.frequency_hz
    );
    println!("\nPublish period: {} ms", config.publish.period_ms);

    if !config.sinks.is_empty() {
        println!("\nSinks ({}):", config.sinks.len());
        for sink in &config.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    if !config.requests.is_empty() {
        println!("\nScripted requests ({}):", config.requests.len());
        for scheduled in &config.requests {
            println!("  - +{}ms {}", scheduled.after_ms, scheduled.request.op_name());
        }
    }

    println!();
}
