// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-handshake project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Fixed-interval cooperative polling
//!
//! [`PollingLoop`] is the only waiting primitive of the handshake. It drives
//! both the trigger watch and the reset wait: evaluate a predicate, sleep until
//! the next tick, repeat until the predicate holds, a deadline elapses or a
//! stop is requested.
//!
//! Deadlines are computed on [`tokio::time::Instant`], which is monotonic, so
//! wall-clock adjustments never shorten or stretch a timeout.

use std::future::Future;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

/// Smallest accepted polling interval
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// How a polling run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The predicate returned `true`
    Satisfied,
    /// The deadline elapsed first
    TimedOut,
    /// A stop was requested
    Cancelled,
}

#[derive(Default)]
struct StopState {
    stopped: AtomicBool,
    notify: Notify,
}

/// Cooperative stop request shared between a loop and its owner
///
/// Clones share the same flag. Once stopped, a signal stays stopped.
#[derive(Clone, Default)]
pub struct StopSignal {
    state: Arc<StopState>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request every loop using this signal to stop before its next tick
    pub fn stop(&self) {
        self.state.stopped.store(true, Ordering::SeqCst);
        self.state.notify.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.state.stopped.load(Ordering::SeqCst)
    }

    /// Resolve once a stop has been requested
    pub async fn stopped(&self) {
        // Registered before the flag check so a concurrent stop() is not missed
        let notified = self.state.notify.notified();
        if self.is_stopped() {
            return;
        }
        notified.await;
    }
}

/// Re-evaluates a predicate once per interval
#[derive(Clone)]
pub struct PollingLoop {
    interval: Duration,
    stop: StopSignal,
}

impl PollingLoop {
    /// Create a loop ticking every `interval` (at least [`MIN_INTERVAL`])
    pub fn new(interval: Duration, stop: StopSignal) -> Self {
        Self {
            interval: interval.max(MIN_INTERVAL),
            stop,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    /// Poll `predicate` until it holds, `timeout` elapses or a stop arrives
    ///
    /// The first evaluation happens immediately. With a timeout, the last
    /// sleep is cut short at the deadline and the predicate is given one final
    /// evaluation there, so a timed-out run returns at the deadline rather than
    /// at the following tick. A predicate error ends the run and is returned
    /// as-is.
    pub async fn run<F, Fut, E>(
        &self,
        timeout: Option<Duration>,
        mut predicate: F,
    ) -> Result<PollOutcome, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, E>>,
    {
        let started = Instant::now();
        let deadline = timeout.map(|timeout| started + timeout);
        let mut next_tick = started;

        loop {
            if self.stop.is_stopped() {
                return Ok(PollOutcome::Cancelled);
            }

            if predicate().await? {
                return Ok(PollOutcome::Satisfied);
            }

            let now = Instant::now();
            if deadline.is_some_and(|deadline| now >= deadline) {
                return Ok(PollOutcome::TimedOut);
            }

            next_tick += self.interval;
            if next_tick <= now {
                // The predicate overran one or more ticks
                next_tick = now + self.interval;
            }
            let wake_at = match deadline {
                Some(deadline) => next_tick.min(deadline),
                None => next_tick,
            };

            tokio::select! {
                _ = tokio::time::sleep_until(wake_at) => {}
                _ = self.stop.stopped() => {}
            }
        }
    }
}
