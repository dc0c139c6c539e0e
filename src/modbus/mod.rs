// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-handshake project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus communication module
//!
//! This module exposes the in-process holding register bank over Modbus TCP
//! so the robot controller can raise Trigger and read Done.
//!
//! ## Key Components
//!
//! - `HandshakeModbusServer`: the request handler serving one
//!   [`MemoryRegisterStore`](crate::register::MemoryRegisterStore).
//! - `serve_registers`: binds a listener and serves connections until the
//!   returned future is dropped.
//!
//! ## Register Map
//!
//! ### Holding Registers (Read/Write)
//!
//! All 65536 addresses exist and read 0 until written. With the default
//! configuration:
//!
//! - Register 1024 / 41025: Trigger, written by the robot
//! - Register 1025 / 41026: Done, written by the handshake coordinator
//!
//! Supported function codes are 0x03 (read holding registers), 0x06 (write
//! single register) and 0x10 (write multiple registers).

pub mod modbus_server;
pub use modbus_server::{serve_registers, HandshakeModbusServer};
