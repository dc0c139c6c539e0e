// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-handshake project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Capture executor configuration

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureKind {
    /// Simulated camera, see [`crate::capture::SimulatedCamera`]
    Simulated,
    /// External program, see [`crate::capture::CommandCapture`]
    Command,
}

/// Selects and parameterizes the capture executor.
///
/// `steps`, `duration_ms` and `fail_probability` apply to the simulated
/// camera; `program` and `args` to the command executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub kind: CaptureKind,

    /// Number of progress steps logged during a simulated capture.
    pub steps: u32,

    /// Total duration of a simulated capture.
    pub duration_ms: u64,

    /// Probability (0.0-1.0) that a simulated capture fails.
    pub fail_probability: f64,

    pub program: Option<String>,

    pub args: Vec<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            kind: CaptureKind::Simulated,
            steps: 4,
            duration_ms: 2000,
            fail_probability: 0.0,
            program: None,
            args: Vec::new(),
        }
    }
}
