// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-handshake project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Holding register store boundary
//!
//! Everything the handshake does goes through the [`RegisterStore`] trait.
//! Two implementations are provided:
//!
//! - [`MemoryRegisterStore`]: an in-process bank covering the full 16-bit
//!   address space, each address reading 0 until written. This is the bank the
//!   Modbus TCP server exposes to the robot controller.
//! - [`ModbusTcpStore`]: a Modbus TCP client connection to a remote bank.
//!
//! Neither implementation retries on failure. A failed read or write is
//! returned to the caller as a [`TransportError`].

use async_trait::async_trait;
use thiserror::Error;

mod memory;
mod modbus_client;

pub use memory::MemoryRegisterStore;
pub use modbus_client::ModbusTcpStore;

/// Failure reaching the register store
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("I/O error while accessing register {address}: {source}")]
    Io {
        address: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Modbus transport failure while accessing register {address}: {reason}")]
    Modbus { address: u16, reason: String },

    #[error("Modbus exception {code} while accessing register {address}")]
    Exception { address: u16, code: String },

    #[error("request for register {address} timed out after {timeout_ms} ms")]
    Timeout { address: u16, timeout_ms: u64 },

    #[error("empty response while reading register {address}")]
    EmptyResponse { address: u16 },

    #[error("register bank unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Read/write access to 16-bit holding registers
///
/// Implementations must be safe to share between tasks: the coordinator, the
/// status heartbeat and the register monitor may all hold the same store.
#[async_trait]
pub trait RegisterStore: Send + Sync {
    /// Read a single holding register
    async fn read_register(&self, address: u16) -> Result<u16, TransportError>;

    /// Write a single holding register
    async fn write_register(&self, address: u16, value: u16) -> Result<(), TransportError>;
}
