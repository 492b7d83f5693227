//! Coordinator state machine and its timers.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;
use wtm_common::clock::add_duration;
use wtm_common::Clock;
use wtm_config::{EngineSettings, WtmConfig};

use crate::api::{PresenceApi, SuggestionApi};
use crate::buffer::SightingBuffer;
use crate::protocol::{PartySuggestion, PartySuggestionStatus, PresenceToken};
use crate::radio::{RadioPresenceManager, RadioStatus};
use crate::token::{until_next_window, TokenProvider};
use crate::uploader::Uploader;

use super::types::{Collaborators, CoordinatorEvent, CreateEventHandler};

/// Participant range for injected debug suggestions.
const DEBUG_PARTICIPANTS: std::ops::RangeInclusive<u32> = 6..=18;

struct CoordinatorState {
    settings: EngineSettings,
    app_active: bool,
    running: bool,
    active_suggestion: Option<PartySuggestion>,
    timers: Vec<JoinHandle<()>>,
}

impl CoordinatorState {
    fn should_run_presence(&self) -> bool {
        self.settings.is_discoverable
            && (self.settings.allow_background_detection || self.app_active)
    }

    fn may_fetch_suggestion(&self, now: DateTime<Utc>) -> bool {
        self.settings.is_discoverable
            && self.settings.suggestions_enabled
            && self.running
            && !self.settings.is_in_cooldown(now)
            && self.active_suggestion.is_none()
    }
}

struct Inner {
    tokens: TokenProvider,
    radio: RadioPresenceManager,
    uploader: Arc<Uploader>,
    buffer: Arc<SightingBuffer>,
    presence_api: Arc<dyn PresenceApi>,
    suggestion_api: Arc<dyn SuggestionApi>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    cooldown: Duration,
    state: Mutex<CoordinatorState>,
    events: mpsc::UnboundedSender<CoordinatorEvent>,
    on_create_event: Mutex<Option<CreateEventHandler>>,
}

/// Owns the presence engine for one device.
pub struct Coordinator {
    inner: Arc<Inner>,
}

impl Coordinator {
    /// Wire up the engine. Nothing runs until [`Coordinator::start`].
    pub fn new(
        parts: Collaborators,
        config: &WtmConfig,
        settings: EngineSettings,
    ) -> (Self, mpsc::UnboundedReceiver<CoordinatorEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let buffer = Arc::new(SightingBuffer::new());
        let uploader = Arc::new(Uploader::new(
            Arc::clone(&buffer),
            Arc::clone(&parts.presence_api),
            &config.presence,
        ));
        let radio = RadioPresenceManager::new(
            parts.radio,
            parts.tokens.clone(),
            Arc::clone(&parts.clock),
            config.presence.service_uuid,
            uploader.clone(),
        );

        let inner = Arc::new(Inner {
            tokens: parts.tokens,
            radio,
            uploader,
            buffer,
            presence_api: parts.presence_api,
            suggestion_api: parts.suggestion_api,
            clock: parts.clock,
            poll_interval: config.suggestions.poll_interval(),
            cooldown: config.suggestions.cooldown(),
            state: Mutex::new(CoordinatorState {
                settings,
                app_active: true,
                running: false,
                active_suggestion: None,
                timers: Vec::new(),
            }),
            events,
            on_create_event: Mutex::new(None),
        });
        (Self { inner }, events_rx)
    }

    /// Bring presence in line with the current settings.
    pub fn start(&self) {
        let mut state = self.inner.lock_state();
        self.inner.update_presence(&mut state);
    }

    /// Stop everything and forget the active suggestion.
    pub fn stop(&self) {
        let mut state = self.inner.lock_state();
        self.inner.halt_presence(&mut state);
        if state.active_suggestion.take().is_some() {
            self.inner.emit(CoordinatorEvent::SuggestionCleared);
        }
    }

    /// Replace the settings snapshot.
    ///
    /// A cooldown already in force is never shortened by the incoming
    /// snapshot; only [`Coordinator::clear_suggestion_cooldown`] lifts it.
    pub fn apply_settings(&self, mut settings: EngineSettings) {
        let suggestions_toggled = {
            let mut state = self.inner.lock_state();
            let toggled = state.settings.suggestions_enabled != settings.suggestions_enabled;
            settings.suggestions_suppressed_until = settings
                .suggestions_suppressed_until
                .max(state.settings.suggestions_suppressed_until);
            state.settings = settings;
            self.inner.update_presence(&mut state);
            toggled
        };
        if suggestions_toggled {
            Inner::spawn_refresh(&self.inner);
        }
    }

    /// Lift the suggestion cooldown and look for a suggestion right away.
    pub fn clear_suggestion_cooldown(&self) {
        let cleared = self
            .inner
            .lock_state()
            .settings
            .suggestions_suppressed_until
            .take();
        if cleared.is_some() {
            info!("suggestion cooldown cleared");
            Inner::spawn_refresh(&self.inner);
        }
    }

    /// Foreground (`true`) or background (`false`).
    pub fn set_app_active(&self, active: bool) {
        let mut state = self.inner.lock_state();
        state.app_active = active;
        self.inner.update_presence(&mut state);
    }

    pub async fn refresh_suggestion_if_needed(&self) {
        self.inner.refresh_suggestion_if_needed().await;
    }

    /// Accept the active suggestion and hand it to the create-event handler.
    pub fn accept(&self) -> Option<PartySuggestion> {
        let suggestion = self.inner.respond(PartySuggestionStatus::Accepted)?;
        let handler = self
            .inner
            .on_create_event
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(handler) = handler {
            handler(&suggestion);
        }
        Some(suggestion)
    }

    pub fn mark_private_party(&self) -> Option<PartySuggestion> {
        self.inner.respond(PartySuggestionStatus::PrivateParty)
    }

    pub fn dismiss(&self) -> Option<PartySuggestion> {
        self.inner.respond(PartySuggestionStatus::Dismissed)
    }

    pub fn set_on_create_event(&self, handler: CreateEventHandler) {
        *self
            .inner
            .on_create_event
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(handler);
    }

    /// Show a synthetic pending suggestion, bypassing the backend.
    pub fn inject_debug_suggestion(&self, participant_count: Option<u32>) -> PartySuggestion {
        let participant_count = participant_count
            .unwrap_or_else(|| rand::thread_rng().gen_range(DEBUG_PARTICIPANTS));
        let suggestion = PartySuggestion {
            id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
            participant_count,
            suggested_at: self.inner.clock.now(),
            status: PartySuggestionStatus::Pending,
        };
        self.inner.lock_state().active_suggestion = Some(suggestion.clone());
        info!(participant_count, "debug suggestion injected");
        self.inner
            .emit(CoordinatorEvent::SuggestionAvailable(suggestion.clone()));
        suggestion
    }

    pub fn active_suggestion(&self) -> Option<PartySuggestion> {
        self.inner.lock_state().active_suggestion.clone()
    }

    pub fn is_presence_running(&self) -> bool {
        self.inner.lock_state().running
    }

    pub fn settings(&self) -> EngineSettings {
        self.inner.lock_state().settings.clone()
    }

    pub fn radio_status(&self) -> RadioStatus {
        self.inner.radio.status()
    }

    pub fn current_token(&self) -> PresenceToken {
        self.inner.tokens.current_token(self.inner.clock.now())
    }

    /// Sightings waiting for the next upload.
    pub fn pending_sightings(&self) -> usize {
        self.inner.buffer.pending_len()
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        let mut state = self.inner.lock_state();
        self.inner.halt_presence(&mut state);
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: CoordinatorEvent) {
        if self.events.send(event).is_err() {
            debug!("no listener for coordinator events");
        }
    }

    fn update_presence(self: &Arc<Self>, state: &mut CoordinatorState) {
        if state.should_run_presence() {
            if state.running {
                return;
            }
            state.running = true;
            self.radio.start();
            self.uploader.start();
            self.register_current_token(state);
            self.start_timers(state);
            info!("presence started");
            self.emit(CoordinatorEvent::PresenceStarted);
        } else {
            self.halt_presence(state);
            if !state.settings.is_discoverable && state.active_suggestion.take().is_some() {
                self.emit(CoordinatorEvent::SuggestionCleared);
            }
        }
    }

    fn halt_presence(&self, state: &mut CoordinatorState) {
        for timer in state.timers.drain(..) {
            timer.abort();
        }
        self.radio.stop();
        self.uploader.stop();
        if state.running {
            state.running = false;
            info!("presence stopped");
            self.emit(CoordinatorEvent::PresenceStopped);
        }
    }

    fn register_current_token(&self, state: &CoordinatorState) {
        if !state.settings.is_discoverable {
            return;
        }
        let token = self.tokens.current_token(self.clock.now());
        let api = Arc::clone(&self.presence_api);
        tokio::spawn(async move {
            match api.register_token(&token).await {
                Ok(()) => debug!(expires_at = %token.expires_at, "token registered"),
                Err(e) => warn!(error = %e, "token registration failed"),
            }
        });
    }

    fn start_timers(self: &Arc<Self>, state: &mut CoordinatorState) {
        for timer in state.timers.drain(..) {
            timer.abort();
        }

        let period = self.tokens.rotation_period();
        let first = until_next_window(self.clock.now(), period);
        let weak = Arc::downgrade(self);
        state.timers.push(tokio::spawn(repeat(weak, first, period, |inner| {
            let state = inner.lock_state();
            inner.register_current_token(&state);
        })));

        let weak = Arc::downgrade(self);
        let poll = self.poll_interval;
        state.timers.push(tokio::spawn(repeat(weak, poll, poll, |inner| {
            Inner::spawn_refresh(inner);
        })));
    }

    fn spawn_refresh(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        tokio::spawn(async move { inner.refresh_suggestion_if_needed().await });
    }

    async fn refresh_suggestion_if_needed(&self) {
        if !self.lock_state().may_fetch_suggestion(self.clock.now()) {
            return;
        }

        match self.suggestion_api.fetch_pending_suggestion().await {
            Ok(Some(suggestion)) => {
                let mut state = self.lock_state();
                if !state.may_fetch_suggestion(self.clock.now()) {
                    debug!("discarding suggestion fetched after presence changed");
                    return;
                }
                state.active_suggestion = Some(suggestion.clone());
                drop(state);
                info!(
                    participant_count = suggestion.participant_count,
                    "party suggestion available"
                );
                self.emit(CoordinatorEvent::SuggestionAvailable(suggestion));
            }
            Ok(None) => debug!("no pending suggestion"),
            Err(e) => warn!(error = %e, "suggestion fetch failed"),
        }
    }

    /// Report `status` for the active suggestion, clear it and start the cooldown.
    fn respond(&self, status: PartySuggestionStatus) -> Option<PartySuggestion> {
        let now = self.clock.now();
        let until = add_duration(now, self.cooldown);
        let suggestion = {
            let mut state = self.lock_state();
            let suggestion = state.active_suggestion.take()?;
            state.settings.suggestions_suppressed_until = Some(until);
            suggestion
        };

        let api = Arc::clone(&self.suggestion_api);
        let id = suggestion.id;
        tokio::spawn(async move {
            if let Err(e) = api.update_status(id, status, now).await {
                debug!(%id, %status, error = %e, "suggestion status report failed");
            }
        });

        info!(%status, until = %until, "suggestion answered, cooling down");
        self.emit(CoordinatorEvent::SuggestionCleared);
        self.emit(CoordinatorEvent::CooldownStarted { until });
        Some(suggestion)
    }
}

/// Run `f` after `first`, then every `period`, until the coordinator is gone.
async fn repeat(
    weak: Weak<Inner>,
    first: Duration,
    period: Duration,
    f: impl Fn(&Arc<Inner>) + Send + 'static,
) {
    let mut ticker = interval_at(Instant::now() + first, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(inner) = weak.upgrade() else {
            return;
        };
        f(&inner);
    }
}
