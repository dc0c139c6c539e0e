// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-handshake project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus TCP configuration
//!
//! This module defines how the register bank is reached: hosted here and
//! served over Modbus TCP, or attached to remotely as a client.

use serde::{Deserialize, Serialize};

/// Where the holding registers live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModbusMode {
    /// Host the register bank in-process and serve it over Modbus TCP
    Server,
    /// Use the register bank of a remote Modbus TCP server
    Client,
}

/// Configuration for the Modbus TCP transport.
///
/// # Fields
///
/// * `enabled` - In server mode, whether the bank is exposed over TCP at all
/// * `mode` - `server` (default) or `client`
/// * `address` - Bind address in server mode, remote host in client mode
/// * `port` - TCP port (default: 502)
/// * `unit_id` - Unit identifier sent by the client (client mode only)
/// * `timeout_ms` - Per-request timeout (client mode only)
///
/// # Example
///
/// ```
/// use modbus_handshake::config::{ModbusConfig, ModbusMode};
///
/// let modbus_config = ModbusConfig {
///     enabled: true,
///     mode: ModbusMode::Server,
///     address: "0.0.0.0".to_string(),
///     port: 502,
///     unit_id: 1,
///     timeout_ms: 1000,
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModbusConfig {
    /// Expose the in-process bank over Modbus TCP.
    ///
    /// With this disabled in server mode the handshake still runs against the
    /// in-process bank, which is only useful for testing.
    pub enabled: bool,

    pub mode: ModbusMode,

    /// Network address to bind to (server) or connect to (client).
    ///
    /// Default is "127.0.0.1". Use "0.0.0.0" to accept the robot controller
    /// on any IPv4 interface.
    pub address: String,

    /// TCP port. Default is 502, the standard Modbus TCP port.
    pub port: u16,

    pub unit_id: u8,

    pub timeout_ms: u64,
}

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: ModbusMode::Server,
            address: "127.0.0.1".to_string(), // Localhost for security
            port: 502,                        // Standard Modbus TCP port
            unit_id: 1,
            timeout_ms: 1000,
        }
    }
}
