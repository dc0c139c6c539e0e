// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-handshake project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Register-based handshake between a robot controller and this vision peer
//!
//! The protocol uses two holding-register flags:
//!
//! | Flag | Written by | Meaning |
//! |------|------------|---------|
//! | Trigger | robot | 1 = take a picture now, 0 = acknowledged Done |
//! | Done | this side | 1 = picture taken, 0 = ready for the next request |
//!
//! A cycle runs `IDLE → TRIGGERED → CAPTURING → DONE_SIGNALED → AWAIT_RESET →
//! IDLE`. Each flag may live at several addresses at once (see
//! [`AddressResolver`]). All waiting is done by polling through
//! [`PollingLoop`].
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use modbus_handshake::capture::SimulatedCamera;
//! use modbus_handshake::handshake::{
//!     AddressResolver, HandshakeCoordinator, HandshakeSettings, Signal, StopSignal,
//! };
//! use modbus_handshake::register::MemoryRegisterStore;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let resolver = AddressResolver::new(Signal::new(1024, &[41025]), Signal::new(1025, &[41026]))?;
//! let camera = SimulatedCamera::new(4, std::time::Duration::from_secs(2), 0.0);
//! let mut coordinator = HandshakeCoordinator::new(
//!     resolver,
//!     Arc::new(MemoryRegisterStore::new()),
//!     Box::new(camera),
//!     HandshakeSettings::default(),
//!     StopSignal::new(),
//! );
//! coordinator.run().await;
//! # Ok(())
//! # }
//! ```

pub mod coordinator;
pub mod events;
pub mod polling;
pub mod session;
pub mod signal;

pub use coordinator::{HandshakeCoordinator, HandshakeSettings, SIGNAL_OFF, SIGNAL_ON};
pub use events::{CycleOutcome, HandshakeError, HandshakeEvent};
pub use polling::{PollOutcome, PollingLoop, StopSignal};
pub use session::{HandshakeSession, HandshakeState};
pub use signal::{
    AddressResolver, ResolverError, Signal, SignalKind, SignalReadError, SignalWriteError,
};
