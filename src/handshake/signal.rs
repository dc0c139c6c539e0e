// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-handshake project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Logical handshake signals and their register addresses
//!
//! The counterpart devices never agreed on an addressing convention: the same
//! register shows up as protocol offset `1025` on one firmware revision and as
//! the PLC-numbered `41026` on another. A [`Signal`] names one logical flag and
//! lists every address that must carry its value; the [`AddressResolver`]
//! keeps those addresses in step.
//!
//! Writes are not atomic across addresses. A peer polling in between may see
//! the primary updated before an alias.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::register::{RegisterStore, TransportError};

/// The two flags making up the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    /// Raised by the robot to request a capture
    Trigger,
    /// Raised by this side once the capture is complete
    Done,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Trigger => write!(f, "Trigger"),
            SignalKind::Done => write!(f, "Done"),
        }
    }
}

/// Register addresses carrying one logical signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    /// Address read when observing the signal, and written first
    pub primary_address: u16,
    /// Addresses mirroring the primary, written in this order after it
    #[serde(default)]
    pub alias_addresses: Vec<u16>,
}

impl Signal {
    pub fn new(primary_address: u16, alias_addresses: &[u16]) -> Self {
        Self {
            primary_address,
            alias_addresses: alias_addresses.to_vec(),
        }
    }

    /// Primary address followed by every alias
    pub fn addresses(&self) -> impl Iterator<Item = u16> + '_ {
        std::iter::once(self.primary_address).chain(self.alias_addresses.iter().copied())
    }
}

/// Rejected address map
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ResolverError {
    #[error("{signal} lists its primary address {address} as an alias")]
    PrimaryAsAlias { signal: SignalKind, address: u16 },

    #[error("{signal} lists alias address {address} more than once")]
    DuplicateAlias { signal: SignalKind, address: u16 },

    #[error("address {address} is used by both Trigger and Done")]
    SharedAddress { address: u16 },
}

/// Failed write to one address of a signal
///
/// Addresses before `address` in write order already hold the new value.
#[derive(Error, Debug)]
#[error("writing {value} to {signal} at register {address} failed: {source}")]
pub struct SignalWriteError {
    pub signal: SignalKind,
    pub address: u16,
    pub value: u16,
    #[source]
    pub source: TransportError,
}

/// Failed read of a signal's primary address
#[derive(Error, Debug)]
#[error("reading {signal} at register {address} failed: {source}")]
pub struct SignalReadError {
    pub signal: SignalKind,
    pub address: u16,
    #[source]
    pub source: TransportError,
}

/// Maps logical signals onto register addresses
///
/// The resolver holds no state besides the address map, so it is cheap to
/// clone and share between the coordinator and monitoring tasks.
#[derive(Debug, Clone)]
pub struct AddressResolver {
    signals: Arc<[Signal; 2]>,
}

impl AddressResolver {
    /// Build a resolver, checking that the two signals never overlap
    pub fn new(trigger: Signal, done: Signal) -> Result<Self, ResolverError> {
        check_signal(SignalKind::Trigger, &trigger)?;
        check_signal(SignalKind::Done, &done)?;

        let trigger_addresses: HashSet<u16> = trigger.addresses().collect();
        if let Some(address) = done.addresses().find(|a| trigger_addresses.contains(a)) {
            return Err(ResolverError::SharedAddress { address });
        }

        Ok(Self {
            signals: Arc::new([trigger, done]),
        })
    }

    pub fn signal(&self, kind: SignalKind) -> &Signal {
        match kind {
            SignalKind::Trigger => &self.signals[0],
            SignalKind::Done => &self.signals[1],
        }
    }

    /// Read the value at the signal's primary address
    pub async fn read(
        &self,
        store: &dyn RegisterStore,
        kind: SignalKind,
    ) -> Result<u16, SignalReadError> {
        let address = self.signal(kind).primary_address;
        store
            .read_register(address)
            .await
            .map_err(|source| SignalReadError {
                signal: kind,
                address,
                source,
            })
    }

    /// Write `value` to the primary address, then to every alias
    ///
    /// Stops at the first failing address and reports it. Nothing is read
    /// back and nothing is retried.
    pub async fn write(
        &self,
        store: &dyn RegisterStore,
        kind: SignalKind,
        value: u16,
    ) -> Result<(), SignalWriteError> {
        for address in self.signal(kind).addresses() {
            store
                .write_register(address, value)
                .await
                .map_err(|source| SignalWriteError {
                    signal: kind,
                    address,
                    value,
                    source,
                })?;
        }
        debug!("{} set to {} on {:?}", kind, value, self.signal(kind));
        Ok(())
    }
}

fn check_signal(kind: SignalKind, signal: &Signal) -> Result<(), ResolverError> {
    let mut seen = HashSet::new();
    for &alias in &signal.alias_addresses {
        if alias == signal.primary_address {
            return Err(ResolverError::PrimaryAsAlias {
                signal: kind,
                address: alias,
            });
        }
        if !seen.insert(alias) {
            return Err(ResolverError::DuplicateAlias {
                signal: kind,
                address: alias,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::MemoryRegisterStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn resolver() -> AddressResolver {
        AddressResolver::new(Signal::new(1024, &[41025]), Signal::new(1025, &[41026]))
            .expect("valid address map")
    }

    /// Records write order and fails on one address
    struct RecordingStore {
        inner: MemoryRegisterStore,
        fail_on: Option<u16>,
        writes: Mutex<Vec<u16>>,
    }

    #[async_trait]
    impl RegisterStore for RecordingStore {
        async fn read_register(&self, address: u16) -> Result<u16, TransportError> {
            self.inner.get(address)
        }

        async fn write_register(&self, address: u16, value: u16) -> Result<(), TransportError> {
            if self.fail_on == Some(address) {
                return Err(TransportError::Unavailable {
                    reason: "unplugged".into(),
                });
            }
            self.writes.lock().unwrap().push(address);
            self.inner.set(address, value)
        }
    }

    #[tokio::test]
    async fn test_write_updates_primary_and_every_alias() {
        let store = MemoryRegisterStore::new();
        let resolver = resolver();

        resolver.write(&store, SignalKind::Done, 1).await.unwrap();

        assert_eq!(store.get(1025).unwrap(), 1);
        assert_eq!(store.get(41026).unwrap(), 1);
        assert_eq!(store.get(1024).unwrap(), 0);
        assert_eq!(resolver.read(&store, SignalKind::Done).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_write_goes_primary_first_then_aliases_in_order() {
        let resolver = AddressResolver::new(
            Signal::new(1024, &[41025]),
            Signal::new(1025, &[41026, 2050]),
        )
        .unwrap();
        let store = RecordingStore {
            inner: MemoryRegisterStore::new(),
            fail_on: None,
            writes: Mutex::new(Vec::new()),
        };

        resolver.write(&store, SignalKind::Done, 1).await.unwrap();

        assert_eq!(*store.writes.lock().unwrap(), vec![1025, 41026, 2050]);
    }

    #[tokio::test]
    async fn test_failing_alias_is_reported_with_its_address() {
        let store = RecordingStore {
            inner: MemoryRegisterStore::new(),
            fail_on: Some(41026),
            writes: Mutex::new(Vec::new()),
        };

        let err = resolver()
            .write(&store, SignalKind::Done, 1)
            .await
            .unwrap_err();

        assert_eq!(err.signal, SignalKind::Done);
        assert_eq!(err.address, 41026);
        // The primary was already written when the alias failed
        assert_eq!(store.inner.get(1025).unwrap(), 1);
    }

    #[test]
    fn test_overlapping_signals_are_rejected() {
        let err = AddressResolver::new(Signal::new(1024, &[1025]), Signal::new(1025, &[])).unwrap_err();
        assert_eq!(err, ResolverError::SharedAddress { address: 1025 });

        let err = AddressResolver::new(Signal::new(1024, &[1024]), Signal::new(1025, &[])).unwrap_err();
        assert_eq!(
            err,
            ResolverError::PrimaryAsAlias {
                signal: SignalKind::Trigger,
                address: 1024
            }
        );

        let err =
            AddressResolver::new(Signal::new(1024, &[]), Signal::new(1025, &[7, 7])).unwrap_err();
        assert_eq!(
            err,
            ResolverError::DuplicateAlias {
                signal: SignalKind::Done,
                address: 7
            }
        );
    }
}
