// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-handshake project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Simulated camera
//!
//! Sleeps through the configured capture duration in equal steps, logging a
//! progress percentage after each one, then "saves" the picture. An optional
//! failure probability exercises the capture failure path.

use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};
use rand::Rng;

use super::{CaptureError, CaptureExecutor};
use crate::config::CaptureConfig;

pub struct SimulatedCamera {
    steps: u32,
    duration: Duration,
    fail_probability: f64,
    captures: u64,
}

impl SimulatedCamera {
    pub fn new(steps: u32, duration: Duration, fail_probability: f64) -> Self {
        Self {
            steps: steps.max(1),
            duration,
            fail_probability: fail_probability.clamp(0.0, 1.0),
            captures: 0,
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(
            config.steps,
            Duration::from_millis(config.duration_ms),
            config.fail_probability,
        )
    }

    /// Captures attempted so far
    pub fn captures(&self) -> u64 {
        self.captures
    }
}

#[async_trait]
impl CaptureExecutor for SimulatedCamera {
    async fn execute(&mut self) -> Result<(), CaptureError> {
        self.captures += 1;
        info!("Camera capture #{} started", self.captures);

        let step = self.duration / self.steps;
        for i in 1..=self.steps {
            tokio::time::sleep(step).await;
            info!("  processing... {}%", i * 100 / self.steps);
        }

        let failed = self.fail_probability > 0.0 && rand::rng().random_bool(self.fail_probability);
        if failed {
            warn!("Camera capture #{} failed", self.captures);
            return Err(CaptureError::new("simulated capture failure"));
        }

        info!("Camera capture #{} complete, image saved", self.captures);
        Ok(())
    }

    fn name(&self) -> &str {
        "simulated camera"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_takes_the_configured_duration() {
        let mut camera = SimulatedCamera::new(4, Duration::from_millis(2000), 0.0);
        let started = Instant::now();

        camera.execute().await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(2000));
        assert_eq!(camera.captures(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_certain_failure_reports_a_reason() {
        let mut camera = SimulatedCamera::new(1, Duration::from_millis(10), 1.0);

        let err = camera.execute().await.unwrap_err();

        assert_eq!(err.reason, "simulated capture failure");
    }
}
