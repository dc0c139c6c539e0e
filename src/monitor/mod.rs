// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-handshake project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Register change monitor
//!
//! Scans configured address ranges on every tick and logs each register whose
//! value changed since the previous scan. It is a diagnostic companion to the
//! handshake: pointing it at the low offsets, the 1024 block and the 41025
//! block shows at a glance which convention a controller writes to.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{info, warn};

use crate::config::{AddressRange, MonitorConfig};
use crate::handshake::{PollingLoop, StopSignal};
use crate::register::RegisterStore;

/// One observed value change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterChange {
    pub address: u16,
    /// `None` on the first scan
    pub previous: Option<u16>,
    pub value: u16,
}

impl RegisterChange {
    /// Log message for this change; first-scan values are listed as-is
    pub fn describe(&self) -> String {
        match self.previous {
            Some(previous) => format!(
                "Register {} changed: {} -> {}",
                self.address, previous, self.value
            ),
            None => format!("Register {} = {}", self.address, self.value),
        }
    }
}

pub struct RegisterMonitor {
    store: Arc<dyn RegisterStore>,
    ranges: Vec<AddressRange>,
    polling: PollingLoop,
    last_values: Mutex<HashMap<u16, u16>>,
}

impl RegisterMonitor {
    pub fn new(
        store: Arc<dyn RegisterStore>,
        ranges: Vec<AddressRange>,
        polling: PollingLoop,
    ) -> Self {
        Self {
            store,
            ranges,
            polling,
            last_values: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(
        config: &MonitorConfig,
        store: Arc<dyn RegisterStore>,
        stop: StopSignal,
    ) -> Self {
        let polling = PollingLoop::new(Duration::from_millis(config.interval_ms), stop);
        Self::new(store, config.ranges.clone(), polling)
    }

    /// Read every monitored register once and return what changed
    ///
    /// Registers that fail to read are skipped and keep their last value.
    pub async fn scan(&self) -> Vec<RegisterChange> {
        let mut current = Vec::new();
        for address in self.ranges.iter().flat_map(AddressRange::addresses) {
            match self.store.read_register(address).await {
                Ok(value) => current.push((address, value)),
                Err(e) => warn!("Monitor: {}", e),
            }
        }

        let Ok(mut last_values) = self.last_values.lock() else {
            return Vec::new();
        };
        current
            .into_iter()
            .filter_map(|(address, value)| {
                let previous = last_values.insert(address, value);
                (previous != Some(value)).then_some(RegisterChange {
                    address,
                    previous,
                    value,
                })
            })
            .collect()
    }

    /// Scan and log changes until the stop signal fires
    pub async fn run(&self) {
        info!(
            "Register monitor watching {} range(s) every {:?}",
            self.ranges.len(),
            self.polling.interval()
        );
        let monitor = self;
        let _ = self
            .polling
            .run(None, move || async move {
                for change in monitor.scan().await {
                    info!("{}", change.describe());
                }
                Ok::<bool, Infallible>(false)
            })
            .await;
        info!("Register monitor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::MemoryRegisterStore;

    fn monitor(store: &MemoryRegisterStore) -> RegisterMonitor {
        RegisterMonitor::new(
            Arc::new(store.clone()),
            vec![AddressRange::new(1024, 1025), AddressRange::new(41025, 41025)],
            PollingLoop::new(Duration::from_millis(10), StopSignal::new()),
        )
    }

    #[tokio::test]
    async fn test_first_scan_reports_every_register() {
        let store = MemoryRegisterStore::with_values([(1024, 1)]);
        let changes = monitor(&store).scan().await;
        assert_eq!(changes.len(), 3);
        assert!(changes.iter().all(|c| c.previous.is_none()));
    }

    #[tokio::test]
    async fn test_first_scan_describes_zero_registers_too() {
        let store = MemoryRegisterStore::with_values([(1024, 1)]);
        let lines: Vec<String> = monitor(&store)
            .scan()
            .await
            .iter()
            .map(RegisterChange::describe)
            .collect();
        assert_eq!(
            lines,
            vec!["Register 1024 = 1", "Register 1025 = 0", "Register 41025 = 0"]
        );
    }

    #[test]
    fn test_change_description() {
        let change = RegisterChange {
            address: 41026,
            previous: Some(1),
            value: 0,
        };
        assert_eq!(change.describe(), "Register 41026 changed: 1 -> 0");
    }

    #[tokio::test]
    async fn test_only_changed_registers_are_reported() {
        let store = MemoryRegisterStore::new();
        let monitor = monitor(&store);
        monitor.scan().await;

        store.set(41025, 1).unwrap();
        let changes = monitor.scan().await;
        assert_eq!(
            changes,
            vec![RegisterChange {
                address: 41025,
                previous: Some(0),
                value: 1
            }]
        );
        assert!(monitor.scan().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ends_on_stop() {
        let store = MemoryRegisterStore::new();
        let stop = StopSignal::new();
        let monitor = Arc::new(RegisterMonitor::new(
            Arc::new(store),
            vec![AddressRange::new(0, 3)],
            PollingLoop::new(Duration::from_millis(50), stop.clone()),
        ));

        let task = tokio::spawn({
            let monitor = monitor.clone();
            async move { monitor.run().await }
        });
        tokio::time::sleep(Duration::from_millis(120)).await;
        stop.stop();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("monitor did not stop")
            .unwrap();
    }
}
