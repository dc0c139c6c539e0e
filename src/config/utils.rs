// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-handshake project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! This module provides utility functions for working with configuration
//! settings, including validation and schema management.

use anyhow::{Context, Result};
use log::{debug, warn};

use super::{CaptureKind, Config};

/// Output the embedded JSON schema to the console.
///
/// This function is called when the `--show-config-schema` flag is provided
/// on the command line.
///
/// # Example
///
/// ```bash
/// ./modbus_handshake --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    let schema_str = include_str!("../../resources/config.schema.json");

    let schema: serde_json::Value =
        serde_json::from_str(schema_str).context("Failed to parse JSON schema")?;

    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;

    println!("{}", formatted_schema);

    Ok(())
}

/// Check if a string is a valid IP address
///
/// Validates that a string represents a valid IPv4 or IPv6 address,
/// or is one of the special values like "localhost" or "0.0.0.0".
pub fn is_valid_ip_address(addr: &str) -> bool {
    if addr.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }

    // Special cases
    matches!(addr, "localhost" | "::" | "::0" | "0.0.0.0")
}

/// Validates the configuration against additional rules that aren't covered by the JSON schema.
///
/// # Validation Rules
///
/// - **Address map**: Trigger and Done addresses must be pairwise distinct
/// - **Port Range**: The Modbus port must be non-zero
/// - **Polling**: The poll interval must be at least 1 ms
/// - **Capture**: The command executor needs a program, the failure probability lies in 0.0-1.0
/// - **Monitor**: Every range must have `start <= end`
/// - **IP Address Format**: Only warns, hostnames are accepted in client mode
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");

    config
        .handshake
        .resolver()
        .context("Invalid handshake address map")?;

    if config.modbus.port == 0 {
        anyhow::bail!("Invalid Modbus port number: {}", config.modbus.port);
    }

    if config.handshake.poll_interval_ms == 0 {
        anyhow::bail!("handshake.poll_interval_ms must be at least 1");
    }

    if !(0.0..=1.0).contains(&config.capture.fail_probability) {
        anyhow::bail!(
            "capture.fail_probability must be between 0.0 and 1.0, got {}",
            config.capture.fail_probability
        );
    }

    if config.capture.kind == CaptureKind::Command
        && config
            .capture
            .program
            .as_deref()
            .map_or(true, |p| p.trim().is_empty())
    {
        anyhow::bail!("capture.program is required when capture.kind is 'command'");
    }

    for range in &config.monitor.ranges {
        if range.start > range.end {
            anyhow::bail!(
                "Invalid monitor range {}-{}: start is after end",
                range.start,
                range.end
            );
        }
    }

    if !is_valid_ip_address(&config.modbus.address) {
        warn!(
            "Modbus address '{}' is not an IP address, it will be resolved as a hostname",
            config.modbus.address
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AddressRange;
    use crate::handshake::Signal;

    #[test]
    fn test_default_config_passes_specific_rules() {
        assert!(validate_specific_rules(&Config::default()).is_ok());
    }

    #[test]
    fn test_overlapping_signals_are_rejected() {
        let mut config = Config::default();
        config.handshake.done = Signal::new(1025, &[41025]);
        let err = validate_specific_rules(&config).unwrap_err();
        assert!(format!("{:#}", err).contains("41025"));
    }

    #[test]
    fn test_command_capture_requires_program() {
        let mut config = Config::default();
        config.capture.kind = CaptureKind::Command;
        assert!(validate_specific_rules(&config).is_err());

        config.capture.program = Some("/usr/bin/true".to_string());
        assert!(validate_specific_rules(&config).is_ok());
    }

    #[test]
    fn test_reversed_monitor_range_is_rejected() {
        let mut config = Config::default();
        config.monitor.ranges = vec![AddressRange::new(10, 5)];
        assert!(validate_specific_rules(&config).is_err());
    }

    #[test]
    fn test_ip_address_validation() {
        assert!(is_valid_ip_address("192.168.1.10"));
        assert!(is_valid_ip_address("::1"));
        assert!(is_valid_ip_address("localhost"));
        assert!(!is_valid_ip_address("robot-cell-3"));
    }
}
