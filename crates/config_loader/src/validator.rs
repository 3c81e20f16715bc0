//! Configuration validation
//!
//! Derived field rules (`validator`) run first, then the cross-field rules:
//! - hfov finite and inside (0, π)
//! - distortion and extrinsics finite
//! - sink names unique, sink params well-formed
//! - scripted requests carry valid arguments

use std::collections::HashSet;
use std::f32::consts::PI;

use contracts::{BridgeConfig, ContractError, ControlRequest, SinkConfig, SinkType};
use validator::Validate;

/// Validate a BridgeConfig
///
/// Returns the first error encountered.
pub fn validate(config: &BridgeConfig) -> Result<(), ContractError> {
    validate_fields(config)?;
    validate_camera(config)?;
    validate_source(config)?;
    validate_sinks(&config.sinks)?;
    validate_requests(config)?;
    Ok(())
}

fn validate_fields(config: &BridgeConfig) -> Result<(), ContractError> {
    config.validate().map_err(|errors| {
        // ValidationErrors renders as "path: message" lines
        let message = errors.to_string();
        let field = message
            .split(':')
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("config")
            .to_string();
        ContractError::config_validation(field, message)
    })
}

fn check_hfov(field: &str, hfov: f32) -> Result<(), ContractError> {
    if !hfov.is_finite() || hfov <= 0.0 || hfov >= PI {
        return Err(ContractError::config_validation(
            field,
            format!("hfov must be finite and in (0, π), got {hfov}"),
        ));
    }
    Ok(())
}

fn check_finite(field: &str, values: &[f32]) -> Result<(), ContractError> {
    if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
        return Err(ContractError::config_validation(
            format!("{field}[{pos}]"),
            "value must be finite",
        ));
    }
    Ok(())
}

fn validate_camera(config: &BridgeConfig) -> Result<(), ContractError> {
    let camera = &config.camera;
    check_hfov("camera.hfov", camera.hfov)?;
    check_finite("camera.distortion", &camera.distortion)?;
    check_finite("camera.extrinsics", &camera.extrinsics)?;

    if camera.max_frame_bytes == Some(0) {
        return Err(ContractError::config_validation(
            "camera.max_frame_bytes",
            "max_frame_bytes must be > 0 when set",
        ));
    }
    Ok(())
}

fn validate_source(config: &BridgeConfig) -> Result<(), ContractError> {
    let frequency = config.source.mock.frequency_hz;
    if !frequency.is_finite() || frequency <= 0.0 {
        return Err(ContractError::config_validation(
            "source.mock.frequency_hz",
            format!("frequency_hz must be finite and > 0, got {frequency}"),
        ));
    }
    Ok(())
}

fn validate_sinks(sinks: &[SinkConfig]) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for sink in sinks {
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
        validate_sink_params(sink)?;
    }
    Ok(())
}

fn validate_sink_params(sink: &SinkConfig) -> Result<(), ContractError> {
    match sink.sink_type {
        SinkType::Log => Ok(()),
        SinkType::File => match sink.params.get("every_nth") {
            Some(n) if !n.parse::<u64>().is_ok_and(|n| n > 0) => {
                Err(ContractError::config_validation(
                    format!("sinks[{}].params.every_nth", sink.name),
                    format!("every_nth must be a positive integer, got '{n}'"),
                ))
            }
            _ => Ok(()),
        },
        SinkType::Network => {
            if !sink.params.contains_key("addr") {
                return Err(ContractError::config_validation(
                    format!("sinks[{}].params", sink.name),
                    "network sink requires 'addr' parameter",
                ));
            }
            Ok(())
        }
    }
}

fn validate_requests(config: &BridgeConfig) -> Result<(), ContractError> {
    for (index, scheduled) in config.requests.iter().enumerate() {
        let field = format!("requests[{index}]");
        match &scheduled.request {
            ControlRequest::Connect {
                locator: Some(locator),
            } if locator.trim().is_empty() => {
                return Err(ContractError::config_validation(
                    format!("{field}.locator"),
                    "locator must not be empty",
                ));
            }
            ControlRequest::SetFormat { width, height } if *width == 0 || *height == 0 => {
                return Err(ContractError::config_validation(
                    field,
                    format!("set_format requires non-zero geometry, got {width}x{height}"),
                ));
            }
            ControlRequest::SetHfov { hfov } => check_hfov(&format!("{field}.hfov"), *hfov)?,
            ControlRequest::SetDistortion { distortion } => {
                check_finite(&format!("{field}.distortion"), distortion)?
            }
            ControlRequest::SetExtrinsics { extrinsics } => {
                check_finite(&format!("{field}.extrinsics"), extrinsics)?
            }
            _ => {}
        }
    }
    Ok(())
}
