// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-handshake project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Daemon Management Module
//!
//! This module starts the tasks of the handshake peer and coordinates their
//! shutdown:
//!
//! - Modbus TCP server exposing the in-process register bank (server mode)
//! - Handshake coordinator
//! - Register monitor (optional)
//! - Status heartbeat
//!
//! In client mode no server is started; every task shares one connection to
//! the remote register bank instead.
//!
//! Every task watches the same [`StopSignal`]. [`Daemon::shutdown`] fires it,
//! and so does a failure of the Modbus listener. Register store failures seen
//! by the coordinator only end the current handshake cycle.

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;

use crate::capture::create_capture_executor;
use crate::config::{Config, HandshakeConfig, ModbusMode};
use crate::handshake::{
    AddressResolver, HandshakeCoordinator, HandshakeSession, SignalKind, StopSignal,
};
use crate::modbus::serve_registers;
use crate::monitor::RegisterMonitor;
use crate::register::{MemoryRegisterStore, ModbusTcpStore, RegisterStore};

/// Represents a daemon task manager that coordinates the background services
///
/// # Fields
///
/// * `tasks` - Handles to running tasks for management and cleanup
/// * `stop` - Stop signal shared with every task
pub struct Daemon {
    tasks: Vec<JoinHandle<Result<()>>>,
    stop: StopSignal,
    store: Option<Arc<dyn RegisterStore>>,
    memory_store: Option<MemoryRegisterStore>,
    modbus_addr: Option<SocketAddr>,
    session: Option<watch::Receiver<HandshakeSession>>,
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}

impl Daemon {
    /// Create a new daemon instance
    ///
    /// # Examples
    ///
    /// ```
    /// use modbus_handshake::daemon::Daemon;
    ///
    /// let daemon = Daemon::new();
    /// // Daemon is now ready to launch tasks
    /// ```
    pub fn new() -> Self {
        Daemon {
            tasks: Vec::new(),
            stop: StopSignal::new(),
            store: None,
            memory_store: None,
            modbus_addr: None,
            session: None,
        }
    }

    /// Launch all configured tasks based on configuration
    ///
    /// # Errors
    ///
    /// Fails if the Modbus listener cannot be bound, the remote server cannot
    /// be reached, the address map is invalid or the capture executor cannot
    /// be built.
    pub async fn launch(&mut self, config: &Config) -> Result<()> {
        let store: Arc<dyn RegisterStore> = match config.modbus.mode {
            ModbusMode::Server => {
                let bank = MemoryRegisterStore::new();
                if config.modbus.enabled {
                    self.start_modbus_server(config, bank.clone()).await?;
                } else {
                    warn!("Modbus server disabled, the register bank is only reachable in-process");
                }
                self.memory_store = Some(bank.clone());
                Arc::new(bank)
            }
            ModbusMode::Client => Arc::new(Self::connect_modbus_client(config).await?),
        };
        self.store = Some(store.clone());

        if config.handshake.enabled {
            self.start_handshake(config, store.clone())?;
        }

        if config.monitor.enabled {
            self.start_monitor(config, store.clone());
        }

        if config.handshake.status_interval_ms > 0 {
            self.start_heartbeat(&config.handshake, store)?;
        }

        Ok(())
    }

    /// Bind the Modbus TCP listener and serve `bank` until shutdown
    async fn start_modbus_server(
        &mut self,
        config: &Config,
        bank: MemoryRegisterStore,
    ) -> Result<()> {
        info!(
            "Starting modbus server on {}:{}",
            config.modbus.address, config.modbus.port
        );
        let listener = TcpListener::bind((config.modbus.address.as_str(), config.modbus.port))
            .await
            .with_context(|| {
                format!(
                    "Failed to bind Modbus server to {}:{}",
                    config.modbus.address, config.modbus.port
                )
            })?;
        self.modbus_addr = Some(listener.local_addr()?);

        let stop = self.stop.clone();
        let task = tokio::spawn(async move {
            let mut server_handle = tokio::spawn(serve_registers(listener, bank));

            tokio::select! {
                result = &mut server_handle => {
                    // The server only returns on a listener failure
                    stop.stop();
                    return match result {
                        Ok(Ok(())) => Ok(()),
                        Ok(Err(e)) => {
                            error!("Modbus server error: {}", e);
                            Err(e)
                        }
                        Err(e) => Err(anyhow::anyhow!("Modbus server task failed: {}", e)),
                    };
                }
                _ = stop.stopped() => {}
            }

            info!("Shutting down Modbus server...");
            server_handle.abort();
            match time::timeout(Duration::from_secs(5), server_handle).await {
                Ok(_) => info!("Modbus server shut down successfully"),
                Err(_) => warn!("Modbus server shutdown timed out, forcing termination"),
            }
            Ok(())
        });

        self.tasks.push(task);
        info!("Modbus server started");
        Ok(())
    }

    async fn connect_modbus_client(config: &Config) -> Result<ModbusTcpStore> {
        let peer = tokio::net::lookup_host((config.modbus.address.as_str(), config.modbus.port))
            .await
            .with_context(|| format!("Failed to resolve Modbus server {}", config.modbus.address))?
            .next()
            .with_context(|| format!("No address found for {}", config.modbus.address))?;

        let store = ModbusTcpStore::connect(
            peer,
            config.modbus.unit_id,
            Duration::from_millis(config.modbus.timeout_ms),
        )
        .await
        .with_context(|| format!("Failed to connect to Modbus server at {}", peer))?;
        info!("Connected to Modbus server at {}", store.peer());
        Ok(store)
    }

    /// Start the handshake coordinator
    fn start_handshake(&mut self, config: &Config, store: Arc<dyn RegisterStore>) -> Result<()> {
        let resolver = config
            .handshake
            .resolver()
            .context("Invalid handshake address map")?;
        let executor = create_capture_executor(&config.capture)?;
        let mut coordinator = HandshakeCoordinator::new(
            resolver,
            store,
            executor,
            config.handshake.settings(),
            self.stop.clone(),
        );
        self.session = Some(coordinator.subscribe());

        let task = tokio::spawn(async move {
            coordinator.run().await;
            Ok(())
        });

        self.tasks.push(task);
        info!("Handshake coordinator started");
        Ok(())
    }

    fn start_monitor(&mut self, config: &Config, store: Arc<dyn RegisterStore>) {
        let monitor = RegisterMonitor::from_config(&config.monitor, store, self.stop.clone());
        let task = tokio::spawn(async move {
            monitor.run().await;
            Ok(())
        });
        self.tasks.push(task);
    }

    /// Start a heartbeat task that logs the handshake status periodically
    fn start_heartbeat(
        &mut self,
        config: &HandshakeConfig,
        store: Arc<dyn RegisterStore>,
    ) -> Result<()> {
        debug!("Starting heartbeat monitor");

        let resolver = config.resolver()?;
        let interval = Duration::from_millis(config.status_interval_ms);
        let session = self.session.clone();
        let stop = self.stop.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = time::sleep(interval) => {}
                    _ = stop.stopped() => break,
                }
                let snapshot = session.as_ref().map(|rx| rx.borrow().clone());
                info!(
                    "{}",
                    status_line(&resolver, store.as_ref(), snapshot.as_ref()).await
                );
            }
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Register store shared by the tasks, once launched
    pub fn register_store(&self) -> Option<Arc<dyn RegisterStore>> {
        self.store.clone()
    }

    /// In-process register bank (server mode only)
    pub fn memory_store(&self) -> Option<&MemoryRegisterStore> {
        self.memory_store.as_ref()
    }

    /// Address the Modbus server is listening on
    pub fn modbus_local_addr(&self) -> Option<SocketAddr> {
        self.modbus_addr
    }

    /// Live view of the handshake session
    pub fn session(&self) -> Option<watch::Receiver<HandshakeSession>> {
        self.session.clone()
    }

    /// Stop signal fired on shutdown or when the Modbus listener fails
    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    /// Stop all running tasks
    pub fn shutdown(&self) {
        info!("Shutting down daemon tasks");
        self.stop.stop();
    }

    /// Wait for all tasks to complete
    ///
    /// Every task is waited for up to 5 seconds. Returns the first error a
    /// task ended with, after all tasks have been waited for.
    pub async fn join(self) -> Result<()> {
        let mut first_error = None;
        for task in self.tasks {
            match time::timeout(Duration::from_secs(5), task).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => {
                    error!("Task failed: {:#}", e);
                    first_error.get_or_insert(e);
                }
                Ok(Err(e)) => error!("Task panicked: {}", e),
                Err(_) => warn!("Task did not complete within timeout period, may be hung"),
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// One-line summary of both flags at every address and of the session
pub async fn status_line(
    resolver: &AddressResolver,
    store: &dyn RegisterStore,
    session: Option<&HandshakeSession>,
) -> String {
    let mut line = String::from("Status:");
    if let Some(session) = session {
        let _ = write!(
            line,
            " state={} shots={} completed={} failures={} reset_timeouts={} transport_errors={}",
            session.state,
            session.shot_count,
            session.completed_cycles,
            session.capture_failures,
            session.reset_timeouts,
            session.transport_errors
        );
    }
    for kind in [SignalKind::Trigger, SignalKind::Done] {
        let _ = write!(line, " {}[", kind);
        for (i, address) in resolver.signal(kind).addresses().enumerate() {
            let value = match store.read_register(address).await {
                Ok(value) => value.to_string(),
                Err(e) => {
                    debug!("Status read of register {} failed: {}", address, e);
                    "?".to_string()
                }
            };
            let sep = if i == 0 { "" } else { " " };
            let _ = write!(line, "{}{}={}", sep, address, value);
        }
        line.push(']');
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handshake::Signal;
    use crate::register::TransportError;
    use async_trait::async_trait;

    /// Bank that cannot read one address
    struct HalfReadable {
        bank: MemoryRegisterStore,
        unreadable: u16,
    }

    #[async_trait]
    impl RegisterStore for HalfReadable {
        async fn read_register(&self, address: u16) -> Result<u16, TransportError> {
            if address == self.unreadable {
                return Err(TransportError::Unavailable {
                    reason: "no route to alias".to_string(),
                });
            }
            self.bank.read_register(address).await
        }

        async fn write_register(&self, address: u16, value: u16) -> Result<(), TransportError> {
            self.bank.write_register(address, value).await
        }
    }

    #[tokio::test]
    async fn test_status_line_lists_every_address() {
        let store = MemoryRegisterStore::with_values([(1024, 1), (41025, 1)]);
        let resolver =
            AddressResolver::new(Signal::new(1024, &[41025]), Signal::new(1025, &[41026]))
                .unwrap();
        let line = status_line(&resolver, &store, None).await;
        assert_eq!(line, "Status: Trigger[1024=1 41025=1] Done[1025=0 41026=0]");
    }

    #[tokio::test]
    async fn test_status_line_includes_session() {
        let store = MemoryRegisterStore::new();
        let resolver = AddressResolver::new(Signal::new(10, &[]), Signal::new(11, &[])).unwrap();
        let session = HandshakeSession::new();
        let line = status_line(&resolver, &store, Some(&session)).await;
        assert!(line.starts_with("Status: state=IDLE shots=0"));
        assert!(line.ends_with("Trigger[10=0] Done[11=0]"));
    }

    #[tokio::test]
    async fn test_status_line_marks_unreadable_addresses() {
        let store = HalfReadable {
            bank: MemoryRegisterStore::with_values([(1025, 1)]),
            unreadable: 41026,
        };
        let resolver =
            AddressResolver::new(Signal::new(1024, &[41025]), Signal::new(1025, &[41026]))
                .unwrap();
        let mut session = HandshakeSession::new();
        session.transport_errors = 2;
        let line = status_line(&resolver, &store, Some(&session)).await;
        assert!(line.contains("transport_errors=2"), "{}", line);
        assert!(line.ends_with("Done[1025=1 41026=?]"), "{}", line);
    }
}
