// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-handshake project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! In-process holding register bank

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use log::debug;

use super::{RegisterStore, TransportError};

/// Number of addressable holding registers
pub const REGISTER_SPACE: u32 = 0x1_0000;

/// Shared holding register bank
///
/// Every address in `0..=65535` exists and reads 0 until it is written, which
/// is how the data bank of a standalone Modbus simulator behaves. Cloning the
/// store yields another handle on the same bank.
///
/// ### Thread Safety
///
/// The registers live in a `Mutex` within an `Arc`, so the Modbus server
/// connections and the handshake coordinator can access them concurrently.
/// Each individual register access is atomic; nothing spanning several
/// addresses is.
#[derive(Clone, Default)]
pub struct MemoryRegisterStore {
    holding_registers: Arc<Mutex<HashMap<u16, u16>>>,
}

impl MemoryRegisterStore {
    /// Create an empty bank (all registers at 0)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bank with some registers preset
    pub fn with_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = (u16, u16)>,
    {
        let store = Self::new();
        if let Ok(mut regs) = store.holding_registers.lock() {
            regs.extend(values);
        }
        store
    }

    fn registers(&self) -> Result<MutexGuard<'_, HashMap<u16, u16>>, TransportError> {
        self.holding_registers
            .lock()
            .map_err(|_| TransportError::Unavailable {
                reason: "register bank lock poisoned".to_string(),
            })
    }

    /// Read one register
    pub fn get(&self, address: u16) -> Result<u16, TransportError> {
        Ok(*self.registers()?.get(&address).unwrap_or(&0))
    }

    /// Write one register
    pub fn set(&self, address: u16, value: u16) -> Result<(), TransportError> {
        self.registers()?.insert(address, value);
        Ok(())
    }

    /// Read `count` consecutive registers starting at `address`
    ///
    /// Returns `None` when the range runs past the last address.
    pub fn get_range(&self, address: u16, count: u16) -> Result<Option<Vec<u16>>, TransportError> {
        if !range_fits(address, count as usize) {
            return Ok(None);
        }
        let regs = self.registers()?;
        Ok(Some(
            (0..count)
                .map(|offset| *regs.get(&(address + offset)).unwrap_or(&0))
                .collect(),
        ))
    }

    /// Write consecutive registers starting at `address`
    ///
    /// Returns `false`, leaving the bank untouched, when the range runs past
    /// the last address.
    pub fn set_range(&self, address: u16, values: &[u16]) -> Result<bool, TransportError> {
        if !range_fits(address, values.len()) {
            return Ok(false);
        }
        let mut regs = self.registers()?;
        for (offset, value) in values.iter().enumerate() {
            regs.insert(address + offset as u16, *value);
        }
        debug!(
            "Wrote {} registers starting at address {}",
            values.len(),
            address
        );
        Ok(true)
    }
}

fn range_fits(address: u16, count: usize) -> bool {
    address as u32 + count as u32 <= REGISTER_SPACE
}

#[async_trait]
impl RegisterStore for MemoryRegisterStore {
    async fn read_register(&self, address: u16) -> Result<u16, TransportError> {
        self.get(address)
    }

    async fn write_register(&self, address: u16, value: u16) -> Result<(), TransportError> {
        self.set(address, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwritten_registers_read_zero() {
        let store = MemoryRegisterStore::new();
        assert_eq!(store.get(0).unwrap(), 0);
        assert_eq!(store.get(41025).unwrap(), 0);
        assert_eq!(store.get(u16::MAX).unwrap(), 0);
    }

    #[test]
    fn test_clones_share_the_bank() {
        let store = MemoryRegisterStore::new();
        let other = store.clone();
        store.set(1025, 1).unwrap();
        assert_eq!(other.get(1025).unwrap(), 1);
    }

    #[test]
    fn test_ranges_past_the_last_address_are_rejected() {
        let store = MemoryRegisterStore::with_values([(65534, 7), (65535, 8)]);
        assert_eq!(store.get_range(65534, 2).unwrap(), Some(vec![7, 8]));
        assert_eq!(store.get_range(65535, 2).unwrap(), None);
        assert!(!store.set_range(65535, &[1, 2]).unwrap());
        assert_eq!(store.get(65535).unwrap(), 8);
    }
}
