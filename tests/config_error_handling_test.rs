// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-handshake project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::Result;
use modbus_handshake::config::Config;
use std::fs;
use std::path::Path;
use std::sync::Once;
use tempfile::tempdir;

static INIT: Once = Once::new();

// Setup logger for tests
fn setup() {
    INIT.call_once(|| {
        env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .is_test(true)
            .init();
    });
}

#[test]
fn test_schema_violation_creates_sample_file() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    let invalid_yaml = r#"
modbus:
  port: "not-an-integer"
  mode: broadcast
handshake:
  poll_interval_ms: -5
"#;
    fs::write(&config_path, invalid_yaml)?;

    let result = Config::from_file(&config_path);
    assert!(result.is_err(), "Config loading should have failed");
    let message = format!("{:#}", result.unwrap_err());
    assert!(message.contains("validation failed"), "{}", message);

    let sample_path = config_path.with_extension("sample.yaml");
    assert!(
        Path::new(&sample_path).exists(),
        "Sample config file was not created"
    );

    // The sample itself is a valid configuration
    let sample_config = Config::from_file(&sample_path)?;
    assert_eq!(sample_config, Config::default());
    Ok(())
}

#[test]
fn test_unknown_section_is_rejected() -> Result<()> {
    setup();
    let result = Config::from_yaml_str("visualization:\n  port: 8080\n");
    assert!(result.is_err());
    Ok(())
}

#[test]
fn test_address_collision_is_rejected() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(
        &config_path,
        r#"
handshake:
  trigger:
    primary_address: 1024
    alias_addresses: [41025]
  done:
    primary_address: 41025
"#,
    )?;

    let err = Config::from_file(&config_path).unwrap_err();
    assert!(format!("{:#}", err).contains("41025"));
    assert!(config_path.with_extension("sample.yaml").exists());
    Ok(())
}

#[test]
fn test_command_capture_without_program_is_rejected() {
    setup();
    let result = Config::from_yaml_str("capture:\n  kind: command\n");
    assert!(result.is_err());
}

#[test]
fn test_out_of_range_probability_is_rejected() {
    setup();
    assert!(Config::from_yaml_str("capture:\n  fail_probability: 1.5\n").is_err());
}

#[test]
fn test_malformed_yaml_is_rejected() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, "handshake: [unclosed\n")?;

    assert!(Config::from_file(&config_path).is_err());
    Ok(())
}
