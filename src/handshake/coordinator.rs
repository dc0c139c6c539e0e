// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-handshake project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Trigger → capture → done → reset state machine
//!
//! One coordinator drives one handshake. It runs as a single sequential task:
//! watch Trigger for a rising edge, run the capture, raise Done, wait for the
//! counterpart to drop Trigger (bounded by the reset timeout), drop Done, and
//! start over.
//!
//! ## Edge detection
//!
//! Each Idle read is compared with the previous Idle read. The first
//! comparison baseline comes from [`HandshakeCoordinator::initialize`], so a
//! Trigger already raised when the coordinator starts is not mistaken for a
//! request. After a reset timeout or a capture failure the baseline is the last
//! Trigger value seen, which still reads 1: the counterpart has to drop and
//! raise Trigger again before another capture runs.
//!
//! ## Failure policy
//!
//! - Capture failure: Done stays 0, Trigger is left alone, back to Idle.
//! - Reset timeout: Done is cleared anyway and a `ResetTimeout` event is
//!   emitted (fail-open).
//! - Register store failure: only the current cycle ends. If Done may be
//!   latched at 1 at that point, one best-effort attempt is made to clear it.
//!   [`HandshakeCoordinator::run_cycle`] returns the error with the signal,
//!   address and state; [`HandshakeCoordinator::run`] reports it as a
//!   `CycleErrored` event, waits one polling interval and starts over from a
//!   fresh Trigger baseline. The failed operation itself is never retried.

use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info, warn};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use super::events::{CycleOutcome, HandshakeError, HandshakeEvent};
use super::polling::{PollOutcome, PollingLoop, StopSignal};
use super::session::{HandshakeSession, HandshakeState};
use super::signal::{AddressResolver, SignalKind};
use crate::capture::CaptureExecutor;
use crate::register::RegisterStore;

/// Value of an asserted flag
pub const SIGNAL_ON: u16 = 1;
/// Value of a cleared flag
pub const SIGNAL_OFF: u16 = 0;

/// Timing policy of a coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeSettings {
    pub poll_interval: Duration,
    /// `None` waits for the Trigger reset forever
    pub reset_timeout: Option<Duration>,
}

impl Default for HandshakeSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            reset_timeout: Some(Duration::from_secs(20)),
        }
    }
}

pub struct HandshakeCoordinator {
    resolver: AddressResolver,
    store: Arc<dyn RegisterStore>,
    executor: Box<dyn CaptureExecutor>,
    polling: PollingLoop,
    reset_timeout: Option<Duration>,
    session: HandshakeSession,
    /// Whether Trigger read 1 at the previous Idle observation
    trigger_baseline: Option<bool>,
    snapshot: watch::Sender<HandshakeSession>,
    events: Option<mpsc::UnboundedSender<HandshakeEvent>>,
}

impl HandshakeCoordinator {
    pub fn new(
        resolver: AddressResolver,
        store: Arc<dyn RegisterStore>,
        executor: Box<dyn CaptureExecutor>,
        settings: HandshakeSettings,
        stop: StopSignal,
    ) -> Self {
        let session = HandshakeSession::new();
        let (snapshot, _) = watch::channel(session.clone());
        Self {
            resolver,
            store,
            executor,
            polling: PollingLoop::new(settings.poll_interval, stop),
            reset_timeout: settings.reset_timeout,
            session,
            trigger_baseline: None,
            snapshot,
            events: None,
        }
    }

    pub fn session(&self) -> &HandshakeSession {
        &self.session
    }

    pub fn resolver(&self) -> &AddressResolver {
        &self.resolver
    }

    /// Read-only view of the session, updated on every state change
    pub fn subscribe(&self) -> watch::Receiver<HandshakeSession> {
        self.snapshot.subscribe()
    }

    /// Start reporting [`HandshakeEvent`]s on a new channel
    ///
    /// Replaces any previously returned receiver.
    pub fn event_stream(&mut self) -> mpsc::UnboundedReceiver<HandshakeEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    /// Record the Trigger baseline and clear Done on every address
    ///
    /// Called by [`run_cycle`](Self::run_cycle) if it has not been called yet,
    /// and again after a cycle ended on a register store failure.
    pub async fn initialize(&mut self) -> Result<(), HandshakeError> {
        self.enter(HandshakeState::Idle);
        let trigger = self.read_signal(SignalKind::Trigger).await?;
        self.trigger_baseline = Some(trigger == SIGNAL_ON);
        self.write_signal(SignalKind::Done, SIGNAL_OFF).await?;

        let trigger_signal = self.resolver.signal(SignalKind::Trigger);
        let done_signal = self.resolver.signal(SignalKind::Done);
        info!(
            "Handshake ready: Trigger at {} (aliases {:?}) reads {}, Done at {} (aliases {:?}) cleared",
            trigger_signal.primary_address,
            trigger_signal.alias_addresses,
            trigger,
            done_signal.primary_address,
            done_signal.alias_addresses
        );
        if trigger == SIGNAL_ON {
            warn!("Trigger is already set; waiting for it to drop before accepting a request");
        }
        Ok(())
    }

    /// Run cycles until a stop is requested
    pub async fn run(&mut self) {
        info!("Waiting for trigger requests...");

        loop {
            match self.run_cycle().await {
                Ok(Some(outcome)) => log_outcome(&outcome),
                Ok(None) => break,
                Err(e) => {
                    self.record_error(&e);
                    if !self.pause_after_error().await {
                        break;
                    }
                }
            }
        }

        info!("Handshake coordinator stopped");
    }

    /// Run one cycle starting from Idle
    ///
    /// Returns `Ok(None)` when a stop was requested before a cycle could
    /// complete.
    pub async fn run_cycle(&mut self) -> Result<Option<CycleOutcome>, HandshakeError> {
        self.enter(HandshakeState::Idle);
        if self.trigger_baseline.is_none() {
            self.initialize().await?;
        }

        if self.wait_for_rising_edge().await? == PollOutcome::Cancelled {
            return Ok(None);
        }

        let now = Utc::now();
        let shot = self.session.record_trigger(now);
        self.enter(HandshakeState::Triggered);
        info!("Trigger request #{} received", shot);
        self.emit(HandshakeEvent::TriggerObserved { shot, at: now });

        self.enter(HandshakeState::Capturing);
        self.emit(HandshakeEvent::CaptureStarted { shot });
        let capture_started = Instant::now();
        if let Err(e) = self.executor.execute().await {
            self.session.capture_failures += 1;
            self.enter(HandshakeState::Idle);
            self.emit(HandshakeEvent::CaptureFailed {
                shot,
                reason: e.reason.clone(),
            });
            return Ok(Some(CycleOutcome::CaptureFailed {
                shot,
                reason: e.reason,
            }));
        }
        let capture_time = capture_started.elapsed();

        if let Err(e) = self.write_signal(SignalKind::Done, SIGNAL_ON).await {
            self.clear_done_best_effort().await;
            self.enter(HandshakeState::Idle);
            return Err(e);
        }
        self.enter(HandshakeState::DoneSignaled);
        info!("Done raised for shot #{}", shot);
        self.emit(HandshakeEvent::DoneSignaled { shot });

        self.enter(HandshakeState::AwaitReset);
        let reset_started = Instant::now();
        let reset = match self.wait_for_trigger_reset().await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.clear_done_best_effort().await;
                self.enter(HandshakeState::Idle);
                return Err(e);
            }
        };
        let waited = reset_started.elapsed();

        let outcome = match reset {
            PollOutcome::Satisfied => {
                debug!("Trigger reset after {} ms", waited.as_millis());
                self.emit(HandshakeEvent::TriggerReset { shot, waited });
                Some(CycleOutcome::Completed { shot, capture_time })
            }
            PollOutcome::TimedOut => {
                self.session.reset_timeouts += 1;
                warn!(
                    "Reset timeout: Trigger still set {} ms after Done for shot #{}",
                    waited.as_millis(),
                    shot
                );
                self.emit(HandshakeEvent::ResetTimeout { shot, waited });
                Some(CycleOutcome::ResetTimedOut { shot, waited })
            }
            PollOutcome::Cancelled => {
                info!("Stop requested while waiting for Trigger reset; clearing Done");
                None
            }
        };

        let cleared = self.write_signal(SignalKind::Done, SIGNAL_OFF).await;
        self.enter(HandshakeState::Idle);
        cleared?;
        self.emit(HandshakeEvent::DoneCleared { shot });

        if matches!(outcome, Some(CycleOutcome::Completed { .. })) {
            self.session.completed_cycles += 1;
            self.publish();
        }
        Ok(outcome)
    }

    async fn wait_for_rising_edge(&mut self) -> Result<PollOutcome, HandshakeError> {
        let previous = AtomicBool::new(self.trigger_baseline.unwrap_or(false));
        let resolver = &self.resolver;
        let store: &dyn RegisterStore = self.store.as_ref();

        let outcome = self
            .polling
            .run(None, || {
                let previous = &previous;
                async move {
                    let value = resolver
                        .read(store, SignalKind::Trigger)
                        .await
                        .map_err(|source| HandshakeError::Read {
                            state: HandshakeState::Idle,
                            source,
                        })?;
                    let active = value == SIGNAL_ON;
                    let was_active = previous.swap(active, Ordering::SeqCst);
                    Ok(active && !was_active)
                }
            })
            .await;

        self.trigger_baseline = Some(previous.load(Ordering::SeqCst));
        outcome
    }

    async fn wait_for_trigger_reset(&mut self) -> Result<PollOutcome, HandshakeError> {
        let last_seen = AtomicU16::new(SIGNAL_ON);
        let resolver = &self.resolver;
        let store: &dyn RegisterStore = self.store.as_ref();

        let outcome = self
            .polling
            .run(self.reset_timeout, || {
                let last_seen = &last_seen;
                async move {
                    let value = resolver
                        .read(store, SignalKind::Trigger)
                        .await
                        .map_err(|source| HandshakeError::Read {
                            state: HandshakeState::AwaitReset,
                            source,
                        })?;
                    last_seen.store(value, Ordering::SeqCst);
                    Ok(value == SIGNAL_OFF)
                }
            })
            .await;

        self.trigger_baseline = Some(last_seen.load(Ordering::SeqCst) == SIGNAL_ON);
        outcome
    }

    /// Count and report a failed cycle, then forget the Trigger baseline
    ///
    /// The next cycle re-reads the baseline and clears Done on every address.
    fn record_error(&mut self, e: &HandshakeError) {
        error!("Handshake cycle failed: {}", e);
        self.session.transport_errors += 1;
        self.trigger_baseline = None;
        self.enter(HandshakeState::Idle);
        self.emit(HandshakeEvent::CycleErrored {
            state: e.state(),
            signal: e.signal(),
            address: e.address(),
            reason: e.to_string(),
        });
    }

    /// Sleep one polling interval; false when a stop arrived meanwhile
    async fn pause_after_error(&self) -> bool {
        let stop = self.polling.stop_signal();
        tokio::select! {
            _ = tokio::time::sleep(self.polling.interval()) => !stop.is_stopped(),
            _ = stop.stopped() => false,
        }
    }

    async fn read_signal(&self, kind: SignalKind) -> Result<u16, HandshakeError> {
        self.resolver
            .read(self.store.as_ref(), kind)
            .await
            .map_err(|source| HandshakeError::Read {
                state: self.session.state,
                source,
            })
    }

    async fn write_signal(&self, kind: SignalKind, value: u16) -> Result<(), HandshakeError> {
        self.resolver
            .write(self.store.as_ref(), kind, value)
            .await
            .map_err(|source| HandshakeError::Write {
                state: self.session.state,
                source,
            })
    }

    async fn clear_done_best_effort(&self) {
        if let Err(e) = self.write_signal(SignalKind::Done, SIGNAL_OFF).await {
            error!("Could not clear Done after a register failure: {}", e);
        }
    }

    fn enter(&mut self, state: HandshakeState) {
        self.session.enter(state);
        self.publish();
    }

    fn publish(&self) {
        self.snapshot.send_replace(self.session.clone());
    }

    fn emit(&mut self, event: HandshakeEvent) {
        if let Some(tx) = &self.events {
            if tx.send(event).is_err() {
                debug!("Handshake event receiver dropped, no longer reporting events");
                self.events = None;
            }
        }
    }
}

fn log_outcome(outcome: &CycleOutcome) {
    match outcome {
        CycleOutcome::Completed { shot, capture_time } => info!(
            "Shot #{} complete (capture {} ms), waiting for the next trigger",
            shot,
            capture_time.as_millis()
        ),
        CycleOutcome::CaptureFailed { shot, reason } => {
            warn!("Shot #{} failed: {}; Done not raised", shot, reason)
        }
        CycleOutcome::ResetTimedOut { shot, waited } => warn!(
            "Shot #{}: Trigger not reset after {} ms, Done cleared anyway",
            shot,
            waited.as_millis()
        ),
    }
}
