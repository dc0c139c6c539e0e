// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-handshake project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Capture executors
//!
//! The coordinator knows nothing about what a "capture" is. It calls
//! [`CaptureExecutor::execute`] once per accepted trigger, waits for it with
//! no timeout of its own, and raises Done only on success.
//!
//! Available executors:
//! - [`SimulatedCamera`]: stands in for the camera, reporting progress in steps
//! - [`CommandCapture`]: runs an external program; exit status decides success

use anyhow::Result;
use async_trait::async_trait;
use log::info;
use thiserror::Error;

mod command;
mod simulated;

pub use command::CommandCapture;
pub use simulated::SimulatedCamera;

use crate::config::{CaptureConfig, CaptureKind};

/// Capture reported failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("capture failed: {reason}")]
pub struct CaptureError {
    pub reason: String,
}

impl CaptureError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Work performed once per accepted trigger
#[async_trait]
pub trait CaptureExecutor: Send + Sync {
    /// Perform one capture
    ///
    /// May run for as long as it needs; cancellation, if any, is the
    /// executor's own business.
    async fn execute(&mut self) -> Result<(), CaptureError>;

    /// Short human-readable name used in logs
    fn name(&self) -> &str;
}

/// Build the executor selected by the configuration
pub fn create_capture_executor(config: &CaptureConfig) -> Result<Box<dyn CaptureExecutor>> {
    let executor: Box<dyn CaptureExecutor> = match config.kind {
        CaptureKind::Simulated => Box::new(SimulatedCamera::from_config(config)),
        CaptureKind::Command => Box::new(CommandCapture::from_config(config)?),
    };
    info!("Using capture executor: {}", executor.name());
    Ok(executor)
}
