// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-handshake project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Handshake state and per-coordinator session bookkeeping

use std::fmt;

use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;

/// Position of the coordinator in the handshake cycle
///
/// `Idle` is both the initial state and the state every cycle returns to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandshakeState {
    Idle,
    Triggered,
    Capturing,
    DoneSignaled,
    AwaitReset,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandshakeState::Idle => "IDLE",
            HandshakeState::Triggered => "TRIGGERED",
            HandshakeState::Capturing => "CAPTURING",
            HandshakeState::DoneSignaled => "DONE_SIGNALED",
            HandshakeState::AwaitReset => "AWAIT_RESET",
        };
        f.write_str(name)
    }
}

/// Long-lived session owned by one coordinator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandshakeSession {
    pub state: HandshakeState,
    /// Rising edges acted upon
    pub shot_count: u64,
    pub last_trigger_observed_at: Option<DateTime<Utc>>,
    /// Cycles that ended with the counterpart clearing Trigger
    pub completed_cycles: u64,
    pub capture_failures: u64,
    pub reset_timeouts: u64,
    /// Cycles ended by a register store failure
    pub transport_errors: u64,
}

impl Default for HandshakeSession {
    fn default() -> Self {
        Self::new()
    }
}

impl HandshakeSession {
    pub fn new() -> Self {
        Self {
            state: HandshakeState::Idle,
            shot_count: 0,
            last_trigger_observed_at: None,
            completed_cycles: 0,
            capture_failures: 0,
            reset_timeouts: 0,
            transport_errors: 0,
        }
    }

    pub(crate) fn enter(&mut self, state: HandshakeState) {
        if self.state != state {
            debug!("Handshake state {} -> {}", self.state, state);
            self.state = state;
        }
    }

    /// Record an accepted rising edge and return its shot number
    pub(crate) fn record_trigger(&mut self, at: DateTime<Utc>) -> u64 {
        self.shot_count += 1;
        self.last_trigger_observed_at = Some(at);
        self.shot_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_idle_with_no_shots() {
        let session = HandshakeSession::new();
        assert_eq!(session.state, HandshakeState::Idle);
        assert_eq!(session.shot_count, 0);
        assert!(session.last_trigger_observed_at.is_none());
    }

    #[test]
    fn test_record_trigger_counts_shots() {
        let mut session = HandshakeSession::new();
        let now = Utc::now();
        assert_eq!(session.record_trigger(now), 1);
        assert_eq!(session.record_trigger(now), 2);
        assert_eq!(session.shot_count, 2);
        assert_eq!(session.last_trigger_observed_at, Some(now));
    }

    #[test]
    fn test_states_display_in_protocol_notation() {
        assert_eq!(HandshakeState::DoneSignaled.to_string(), "DONE_SIGNALED");
        assert_eq!(HandshakeState::AwaitReset.to_string(), "AWAIT_RESET");
    }
}
