// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-handshake project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Register store backed by a remote Modbus TCP server
//!
//! Only holding register reads (0x03) and single register writes (0x06) are
//! issued. The connection is not re-established on failure: a broken
//! connection surfaces as a [`TransportError`] on every subsequent request.

use std::{net::SocketAddr, time::Duration};

use async_trait::async_trait;
use log::{debug, info};
use tokio::sync::Mutex;
use tokio_modbus::{client::Context, prelude::*};

use super::{RegisterStore, TransportError};

/// Modbus TCP client implementing [`RegisterStore`]
///
/// The client context is behind an async mutex so one connection can be
/// shared by the coordinator and the monitoring tasks. Requests are
/// serialized on the connection.
pub struct ModbusTcpStore {
    ctx: Mutex<Context>,
    timeout: Duration,
    peer: SocketAddr,
}

impl ModbusTcpStore {
    /// Connect to `peer` using the given unit identifier
    ///
    /// `timeout` bounds every request, including the initial connection.
    pub async fn connect(
        peer: SocketAddr,
        unit_id: u8,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        info!("Connecting to Modbus server at {} (unit {})", peer, unit_id);
        let ctx = tokio::time::timeout(timeout, tcp::connect_slave(peer, Slave(unit_id)))
            .await
            .map_err(|_| TransportError::Timeout {
                address: 0,
                timeout_ms: timeout.as_millis() as u64,
            })?
            .map_err(|source| TransportError::Io { address: 0, source })?;

        Ok(Self {
            ctx: Mutex::new(ctx),
            timeout,
            peer,
        })
    }

    /// Address of the remote server
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    fn timeout_error(&self, address: u16) -> TransportError {
        TransportError::Timeout {
            address,
            timeout_ms: self.timeout.as_millis() as u64,
        }
    }
}

#[async_trait]
impl RegisterStore for ModbusTcpStore {
    async fn read_register(&self, address: u16) -> Result<u16, TransportError> {
        let mut ctx = self.ctx.lock().await;
        let response = tokio::time::timeout(self.timeout, ctx.read_holding_registers(address, 1))
            .await
            .map_err(|_| self.timeout_error(address))?
            .map_err(|e| TransportError::Modbus {
                address,
                reason: e.to_string(),
            })?
            .map_err(|code| TransportError::Exception {
                address,
                code: format!("{code:?}"),
            })?;

        debug!("Read register {} from {}: {:?}", address, self.peer, response);
        response
            .first()
            .copied()
            .ok_or(TransportError::EmptyResponse { address })
    }

    async fn write_register(&self, address: u16, value: u16) -> Result<(), TransportError> {
        let mut ctx = self.ctx.lock().await;
        tokio::time::timeout(self.timeout, ctx.write_single_register(address, value))
            .await
            .map_err(|_| self.timeout_error(address))?
            .map_err(|e| TransportError::Modbus {
                address,
                reason: e.to_string(),
            })?
            .map_err(|code| TransportError::Exception {
                address,
                code: format!("{code:?}"),
            })?;

        debug!("Wrote {} to register {} on {}", value, address, self.peer);
        Ok(())
    }
}
