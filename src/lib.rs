// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-handshake project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus handshake library
//!
//! This library implements the vision side of a register-based trigger
//! handshake with a robot controller: the robot raises a Trigger holding
//! register, this peer captures, raises Done, and both flags are reset before
//! the next request.

pub mod capture;
pub mod config;
pub mod daemon;
pub mod handshake;
pub mod modbus;
pub mod monitor;
pub mod register;
