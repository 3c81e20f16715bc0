//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{BridgeConfig, ControlRequest};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    geometry: String,
    hfov: f32,
    locator: String,
    sink_count: usize,
    request_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            error: Some(format!("File not found: {}", config_path)),
            config_path,
            warnings: Vec::new(),
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => ValidationResult {
            valid: true,
            config_path,
            error: None,
            warnings: collect_warnings(&config),
            summary: Some(ConfigSummary {
                geometry: format!("{}x{}", config.camera.width, config.camera.height),
                hfov: config.camera.hfov,
                locator: config.source.locator.clone(),
                sink_count: config.sinks.len(),
                request_count: config.requests.len(),
            }),
        },
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: Vec::new(),
            summary: None,
        },
    }
}

/// Non-fatal configuration issues
fn collect_warnings(config: &BridgeConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.sinks.is_empty() {
        warnings.push("No sinks configured - published records will be discarded".to_string());
    }

    let mock = &config.source.mock;
    if (mock.width, mock.height) != (config.camera.width, config.camera.height) {
        warnings.push(format!(
            "Source emits {}x{} but camera is {}x{} - frames will be rejected until a matching set_format",
            mock.width, mock.height, config.camera.width, config.camera.height
        ));
    }

    if !config.source.connect_on_start
        && !config
            .requests
            .iter()
            .any(|r| matches!(r.request, ControlRequest::Connect { .. }))
    {
        warnings.push("Bridge never connects - no frames will be published".to_string());
    }

    let frame_period_ms = 1000.0 / mock.frequency_hz;
    if (config.publish.period_ms as f64) > frame_period_ms {
        warnings.push(format!(
            "Publish period {} ms is longer than the source frame period {:.1} ms - frames will be overwritten",
            config.publish.period_ms, frame_period_ms
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Geometry: {}", summary.geometry);
            println!("  HFOV: {:.4} rad", summary.hfov);
            println!("  Locator: {}", summary.locator);
            println!("  Sinks: {}", summary.sink_count);
            println!("  Scripted requests: {}", summary.request_count);
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
