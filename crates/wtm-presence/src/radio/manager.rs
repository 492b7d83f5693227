//! Advertising / scanning state machine.
//!
//! Each role runs only while the engine wants presence *and* that role's
//! radio reports powered on. Power changes arrive as events, so a radio
//! that is off or unauthorized simply waits; nothing polls.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;
use wtm_common::Clock;
use wtm_config::RSSI_UNAVAILABLE;

use crate::protocol::PresenceSighting;
use crate::token::{until_next_window, TokenProvider};

use super::types::{Advertisement, RadioDriver, RadioEvent, RadioPower};

/// Receives every sighting that survives the radio-level filters.
pub trait SightingSink: Send + Sync {
    fn record(&self, sighting: PresenceSighting);
}

/// Snapshot of both radio roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RadioStatus {
    pub is_scanning: bool,
    pub is_advertising: bool,
    pub scanner_power: RadioPower,
    pub advertiser_power: RadioPower,
}

#[derive(Default)]
struct RadioState {
    should_run: bool,
    status: RadioStatus,
    republish: Option<JoinHandle<()>>,
}

struct Inner {
    driver: Arc<dyn RadioDriver>,
    tokens: TokenProvider,
    clock: Arc<dyn Clock>,
    service_id: Uuid,
    sink: Arc<dyn SightingSink>,
    state: Mutex<RadioState>,
    events: Mutex<Option<JoinHandle<()>>>,
}

/// Drives a [`RadioDriver`] on behalf of the presence engine.
pub struct RadioPresenceManager {
    inner: Arc<Inner>,
}

impl RadioPresenceManager {
    pub fn new(
        driver: Arc<dyn RadioDriver>,
        tokens: TokenProvider,
        clock: Arc<dyn Clock>,
        service_id: Uuid,
        sink: Arc<dyn SightingSink>,
    ) -> Self {
        let status = RadioStatus {
            scanner_power: driver.scanner_power(),
            advertiser_power: driver.advertiser_power(),
            ..Default::default()
        };
        Self {
            inner: Arc::new(Inner {
                driver,
                tokens,
                clock,
                service_id,
                sink,
                state: Mutex::new(RadioState {
                    status,
                    ..Default::default()
                }),
                events: Mutex::new(None),
            }),
        }
    }

    /// Begin advertising and scanning as soon as each radio allows it.
    pub fn start(&self) {
        self.ensure_event_loop();

        let mut state = self.inner.lock_state();
        if state.should_run {
            return;
        }
        state.should_run = true;
        info!("radio presence starting");

        self.inner.start_scanning(&mut state);
        self.inner.start_advertising(&mut state);

        let inner = Arc::clone(&self.inner);
        state.republish = Some(tokio::spawn(republish_loop(inner)));
    }

    /// Halt both roles and cancel the re-publish timer. Idempotent.
    pub fn stop(&self) {
        let mut state = self.inner.lock_state();
        if let Some(handle) = state.republish.take() {
            handle.abort();
        }
        if !state.should_run {
            return;
        }
        state.should_run = false;
        self.inner.stop_scanning(&mut state);
        self.inner.stop_advertising(&mut state);
        info!("radio presence stopped");
    }

    pub fn status(&self) -> RadioStatus {
        self.inner.lock_state().status
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock_state().should_run
    }

    fn ensure_event_loop(&self) {
        let mut events = self.inner.events.lock().unwrap_or_else(|e| e.into_inner());
        if events.is_some() {
            return;
        }
        match self.inner.driver.take_events() {
            Some(rx) => {
                let inner = Arc::clone(&self.inner);
                *events = Some(tokio::spawn(event_loop(inner, rx)));
            }
            None => warn!("radio driver event stream already taken"),
        }
    }
}

impl Drop for RadioPresenceManager {
    fn drop(&mut self) {
        self.stop();
        if let Some(handle) = self
            .inner
            .events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }
    }
}

impl Inner {
    fn lock_state(&self) -> std::sync::MutexGuard<'_, RadioState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn start_scanning(&self, state: &mut RadioState) {
        if !state.should_run || state.status.is_scanning || !state.status.scanner_power.is_on() {
            return;
        }
        match self.driver.start_scanning(self.service_id) {
            Ok(()) => {
                state.status.is_scanning = true;
                debug!("scanning started");
            }
            Err(e) => warn!(error = %e, "failed to start scanning"),
        }
    }

    fn stop_scanning(&self, state: &mut RadioState) {
        if state.status.is_scanning {
            self.driver.stop_scanning();
            state.status.is_scanning = false;
            debug!("scanning stopped");
        }
    }

    fn start_advertising(&self, state: &mut RadioState) {
        if !state.should_run || state.status.is_advertising || !state.status.advertiser_power.is_on()
        {
            return;
        }
        let advertisement = Advertisement {
            service_id: self.service_id,
            payload: self.tokens.current_token_bytes(self.clock.now()),
        };
        match self.driver.start_advertising(advertisement) {
            Ok(()) => {
                state.status.is_advertising = true;
                debug!("advertising started");
            }
            Err(e) => warn!(error = %e, "failed to start advertising"),
        }
    }

    fn stop_advertising(&self, state: &mut RadioState) {
        if state.status.is_advertising {
            self.driver.stop_advertising();
            state.status.is_advertising = false;
            debug!("advertising stopped");
        }
    }

    /// Replace the advertisement with the token for "now".
    fn republish(&self) {
        let mut state = self.lock_state();
        if !state.should_run {
            return;
        }
        self.stop_advertising(&mut state);
        self.start_advertising(&mut state);
    }

    fn handle_event(&self, event: RadioEvent) {
        match event {
            RadioEvent::ScannerPower(power) => {
                let mut state = self.lock_state();
                state.status.scanner_power = power;
                debug!(?power, "scanner power changed");
                if power.is_on() {
                    self.start_scanning(&mut state);
                } else {
                    self.stop_scanning(&mut state);
                }
            }
            RadioEvent::AdvertiserPower(power) => {
                let mut state = self.lock_state();
                state.status.advertiser_power = power;
                debug!(?power, "advertiser power changed");
                if power.is_on() {
                    self.start_advertising(&mut state);
                } else {
                    self.stop_advertising(&mut state);
                }
            }
            RadioEvent::Discovered { service_data, rssi } => {
                if !self.lock_state().status.is_scanning {
                    return;
                }
                let Some(payload) = service_data.get(&self.service_id) else {
                    return;
                };
                if payload.is_empty() || rssi == RSSI_UNAVAILABLE {
                    return;
                }

                let now = self.clock.now();
                let seen_token = hex::encode(payload);
                let own = self.tokens.current_token(now);
                if seen_token == own.value {
                    return;
                }

                self.sink.record(PresenceSighting {
                    observer_token: own.value,
                    seen_token,
                    rssi: i32::from(rssi),
                    seen_at: now,
                });
            }
        }
    }
}

async fn event_loop(inner: Arc<Inner>, mut rx: mpsc::UnboundedReceiver<RadioEvent>) {
    while let Some(event) = rx.recv().await {
        inner.handle_event(event);
    }
    debug!("radio event stream closed");
}

/// Re-derive the advertised token on every window boundary.
async fn republish_loop(inner: Arc<Inner>) {
    let period = inner.tokens.rotation_period();
    let first = until_next_window(inner.clock.now(), period);
    let mut ticker = interval_at(Instant::now() + first, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        debug!("re-publishing presence advertisement");
        inner.republish();
    }
}
