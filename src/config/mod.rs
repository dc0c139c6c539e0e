// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-handshake project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the handshake daemon
//!
//! This module provides functionality for loading, validating, and applying
//! configuration settings. The configuration is backed by a YAML file and
//! validated against a JSON schema before it is deserialized.
//!
//! ## Configuration Structure
//!
//! - `modbus`: How the holding registers are reached (hosted server or remote client)
//! - `handshake`: Address map and timing of the trigger/done handshake
//! - `capture`: Which capture executor runs on every trigger
//! - `monitor`: Optional register change logger
//!
//! ## Usage
//!
//! ```no_run
//! use modbus_handshake::config::Config;
//! use std::path::Path;
//!
//! // Load config from file, creates a default if not found
//! let mut config = Config::from_file(Path::new("config.yaml")).unwrap();
//!
//! // Apply command line overrides if needed
//! config.apply_args(
//!     None,                        // Modbus mode
//!     Some("0.0.0.0".to_string()), // Modbus address
//!     Some(5020),                  // Modbus port
//!     Some(20),                    // Poll interval (ms)
//!     None,                        // Reset timeout (ms)
//!     Some(500),                   // Capture duration (ms)
//!     false,                       // Enable monitor
//! );
//!
//! println!("Trigger primary address: {}", config.handshake.trigger.primary_address);
//! ```

pub mod capture;
pub mod handshake;
pub mod modbus;
pub mod monitor;
pub mod utils;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};

// Re-export all types for public API
pub use capture::{CaptureConfig, CaptureKind};
pub use handshake::HandshakeConfig;
pub use modbus::{ModbusConfig, ModbusMode};
pub use monitor::{AddressRange, MonitorConfig};
pub use utils::{is_valid_ip_address, output_config_schema};

/// Root configuration structure.
///
/// Every section falls back to its defaults when missing from the file, so an
/// empty YAML document is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub modbus: ModbusConfig,

    #[serde(default)]
    pub handshake: HandshakeConfig,

    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let sample_path = path.with_extension("sample.yaml");
        debug!("Original path: {:?}, Sample path: {:?}", path, sample_path);

        if let Some(parent) = sample_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!("Creating parent directory: {:?}", parent);
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create parent directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        Self::default()
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file
    ///
    /// A missing file is created with the default configuration. When the file
    /// fails validation, a `<name>.sample.yaml` holding the defaults is written
    /// next to it and the error is returned.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        Self::from_yaml_str(&contents).inspect_err(|_| {
            if let Err(e) = Self::create_sample_config(path) {
                error!("Failed to create sample config: {}", e);
            }
        })
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        // An empty document stands for an empty mapping
        let yaml_value: serde_yml::Value = if contents.trim().is_empty() {
            serde_yml::Value::Null
        } else {
            serde_yml::from_str(contents).context("Failed to parse YAML configuration")?
        };
        let yaml_value = if yaml_value.is_null() {
            serde_yml::Value::Mapping(serde_yml::Mapping::new())
        } else {
            yaml_value
        };

        let json_value = serde_json::to_value(&yaml_value)
            .context("Failed to convert YAML to JSON for validation")?;

        let schema_str = include_str!("../../resources/config.schema.json");
        let schema: serde_json::Value =
            serde_json::from_str(schema_str).context("Failed to parse JSON schema")?;

        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)?;

        debug!("Validating configuration against schema");
        if let Err(error) = validator.validate(&json_value) {
            error!("Configuration validation error before deserialization");
            anyhow::bail!("Configuration validation failed: {}", error);
        }

        let config: Config = serde_json::from_value(json_value).map_err(|err| {
            error!("Configuration deserialization error: {}", err);
            anyhow::anyhow!("Failed to deserialize configuration: {}", err)
        })?;

        if let Err(err) = utils::validate_specific_rules(&config) {
            error!("Configuration specific validation error: {}", err);
            return Err(err);
        }

        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Apply command line arguments to override configuration values.
    ///
    /// Only the values that are provided override the loaded configuration.
    ///
    /// # Parameters
    ///
    /// * `modbus_mode` - Host the register bank or attach to a remote one
    /// * `modbus_address` - Bind address (server) or remote host (client)
    /// * `modbus_port` - Modbus TCP port
    /// * `poll_interval_ms` - Handshake polling period
    /// * `reset_timeout_ms` - Reset wait limit, 0 waits forever
    /// * `capture_duration_ms` - Duration of a simulated capture
    /// * `monitor` - If true, enables the register monitor
    #[allow(clippy::too_many_arguments)]
    pub fn apply_args(
        &mut self,
        modbus_mode: Option<ModbusMode>,
        modbus_address: Option<String>,
        modbus_port: Option<u16>,
        poll_interval_ms: Option<u64>,
        reset_timeout_ms: Option<u64>,
        capture_duration_ms: Option<u64>,
        monitor: bool,
    ) {
        if let Some(mode) = modbus_mode {
            debug!("Overriding Modbus mode from command line: {:?}", mode);
            self.modbus.mode = mode;
        }
        if let Some(address) = modbus_address {
            debug!("Overriding Modbus address from command line: {}", address);
            self.modbus.address = address;
        }
        if let Some(port) = modbus_port {
            debug!("Overriding Modbus port from command line: {}", port);
            self.modbus.port = port;
        }

        if let Some(interval) = poll_interval_ms {
            debug!("Overriding poll interval from command line: {}", interval);
            self.handshake.poll_interval_ms = interval;
        }
        if let Some(timeout) = reset_timeout_ms {
            debug!("Overriding reset timeout from command line: {}", timeout);
            self.handshake.reset_timeout_ms = Some(timeout);
        }

        if let Some(duration) = capture_duration_ms {
            debug!("Overriding capture duration from command line: {}", duration);
            self.capture.duration_ms = duration;
        }

        if monitor {
            self.monitor.enabled = true;
        }
    }
}
