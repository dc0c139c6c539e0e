// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-handshake project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Capture delegated to an external program

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use tokio::process::Command;

use super::{CaptureError, CaptureExecutor};
use crate::config::CaptureConfig;

/// Runs `program args...` for each capture; exit status 0 means success
pub struct CommandCapture {
    program: String,
    args: Vec<String>,
    label: String,
}

impl CommandCapture {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        let program = program.into();
        let label = format!("command `{}`", program);
        Self {
            program,
            args,
            label,
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Result<Self> {
        let program = config
            .program
            .clone()
            .filter(|p| !p.trim().is_empty())
            .context("capture.kind is `command` but capture.program is not set")?;
        Ok(Self::new(program, config.args.clone()))
    }
}

#[async_trait]
impl CaptureExecutor for CommandCapture {
    async fn execute(&mut self) -> Result<(), CaptureError> {
        debug!("Running capture command {} {:?}", self.program, self.args);
        let status = Command::new(&self.program)
            .args(&self.args)
            .status()
            .await
            .map_err(|e| CaptureError::new(format!("failed to run {}: {}", self.program, e)))?;

        if status.success() {
            info!("Capture command {} succeeded", self.program);
            Ok(())
        } else {
            Err(CaptureError::new(format!(
                "{} exited with {}",
                self.program, status
            )))
        }
    }

    fn name(&self) -> &str {
        &self.label
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_exit_status_decides_success() {
        let mut ok = CommandCapture::new("true", Vec::new());
        assert!(ok.execute().await.is_ok());

        let mut failing = CommandCapture::new("false", Vec::new());
        let err = failing.execute().await.unwrap_err();
        assert!(err.reason.contains("exited with"));
    }

    #[tokio::test]
    async fn test_missing_program_is_a_capture_failure() {
        let mut missing = CommandCapture::new("/nonexistent/capture-tool", Vec::new());
        let err = missing.execute().await.unwrap_err();
        assert!(err.reason.starts_with("failed to run"));
    }
}
