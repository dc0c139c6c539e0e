// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-handshake project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Handshake timing and address map configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::handshake::{AddressResolver, HandshakeSettings, ResolverError, Signal};

/// Configuration of the trigger/done handshake.
///
/// The default address map is the one the robot controller expects: the
/// trigger at protocol offset 1024 (PLC address 41025) and the done flag at
/// 1025 (PLC address 41026), each mirrored under its PLC-numbered alias
/// because controller firmware revisions disagree on which form they use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeConfig {
    /// Run the handshake coordinator.
    pub enabled: bool,

    /// Polling period for both the trigger watch and the reset wait.
    pub poll_interval_ms: u64,

    /// Longest wait for the robot to drop Trigger after Done was raised.
    ///
    /// `null` or 0 waits forever. Default: 20000 ms.
    pub reset_timeout_ms: Option<u64>,

    pub trigger: Signal,

    pub done: Signal,

    /// Period of the status heartbeat log line, 0 disables it.
    pub status_interval_ms: u64,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: 50,
            reset_timeout_ms: Some(20_000),
            trigger: Signal::new(1024, &[41025]),
            done: Signal::new(1025, &[41026]),
            status_interval_ms: 10_000,
        }
    }
}

impl HandshakeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reset timeout, `None` when disabled
    pub fn reset_timeout(&self) -> Option<Duration> {
        self.reset_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    pub fn settings(&self) -> HandshakeSettings {
        HandshakeSettings {
            poll_interval: self.poll_interval(),
            reset_timeout: self.reset_timeout(),
        }
    }

    pub fn resolver(&self) -> Result<AddressResolver, ResolverError> {
        AddressResolver::new(self.trigger.clone(), self.done.clone())
    }
}
