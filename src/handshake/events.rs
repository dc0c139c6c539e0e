// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-handshake project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Errors, events and cycle outcomes reported by the coordinator

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::session::HandshakeState;
use super::signal::{SignalKind, SignalReadError, SignalWriteError};

/// Register store failure surfaced by the coordinator
///
/// Carries the signal, the register address and the handshake state at the
/// moment of failure so a desynchronized handshake can be diagnosed from the
/// message alone.
#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("{source} (state {state})")]
    Read {
        state: HandshakeState,
        #[source]
        source: SignalReadError,
    },

    #[error("{source} (state {state})")]
    Write {
        state: HandshakeState,
        #[source]
        source: SignalWriteError,
    },
}

impl HandshakeError {
    pub fn signal(&self) -> SignalKind {
        match self {
            HandshakeError::Read { source, .. } => source.signal,
            HandshakeError::Write { source, .. } => source.signal,
        }
    }

    pub fn address(&self) -> u16 {
        match self {
            HandshakeError::Read { source, .. } => source.address,
            HandshakeError::Write { source, .. } => source.address,
        }
    }

    pub fn state(&self) -> HandshakeState {
        match self {
            HandshakeError::Read { state, .. } | HandshakeError::Write { state, .. } => *state,
        }
    }
}

/// Progress notifications, in the order they occur within a cycle
#[derive(Debug, Clone, PartialEq)]
pub enum HandshakeEvent {
    TriggerObserved { shot: u64, at: DateTime<Utc> },
    CaptureStarted { shot: u64 },
    CaptureFailed { shot: u64, reason: String },
    DoneSignaled { shot: u64 },
    TriggerReset { shot: u64, waited: Duration },
    ResetTimeout { shot: u64, waited: Duration },
    DoneCleared { shot: u64 },
    /// A register store failure ended the cycle; the coordinator keeps running
    CycleErrored {
        state: HandshakeState,
        signal: SignalKind,
        address: u16,
        reason: String,
    },
}

/// How one trigger cycle ended
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Done raised, Trigger cleared by the counterpart, Done cleared
    Completed { shot: u64, capture_time: Duration },
    /// The executor failed; Done was never raised
    CaptureFailed { shot: u64, reason: String },
    /// Trigger was still set when the reset wait ran out; Done cleared anyway
    ResetTimedOut { shot: u64, waited: Duration },
}

impl CycleOutcome {
    pub fn shot(&self) -> u64 {
        match self {
            CycleOutcome::Completed { shot, .. }
            | CycleOutcome::CaptureFailed { shot, .. }
            | CycleOutcome::ResetTimedOut { shot, .. } => *shot,
        }
    }
}
