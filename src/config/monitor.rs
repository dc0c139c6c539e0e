// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-handshake project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Register monitor configuration

use serde::{Deserialize, Serialize};

/// Inclusive range of register addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRange {
    pub start: u16,
    pub end: u16,
}

impl AddressRange {
    pub fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    pub fn addresses(&self) -> impl Iterator<Item = u16> {
        self.start..=self.end
    }
}

/// Watches address ranges and logs every value change.
///
/// Useful to find out which addressing convention a controller uses: the
/// default ranges cover low offsets, the protocol offsets around 1024 and the
/// PLC-numbered addresses around 41025.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub enabled: bool,
    pub interval_ms: u64,
    pub ranges: Vec<AddressRange>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: 50,
            ranges: vec![
                AddressRange::new(0, 10),
                AddressRange::new(1024, 1030),
                AddressRange::new(41025, 41030),
            ],
        }
    }
}
