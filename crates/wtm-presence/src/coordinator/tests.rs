//! Coordinator behaviour against the simulated radio and in-memory backend.

use super::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;
use wtm_common::{Clock, ManualClock};
use wtm_config::{EngineSettings, WtmConfig};

use crate::api::MemoryApi;
use crate::protocol::{PartySuggestion, PartySuggestionStatus};
use crate::radio::{SimulatedAir, SimulatedRadio};
use crate::seed::{MemorySeedPersistence, Seed, SeedStore, SEED_LEN};
use crate::token::TokenProvider;

const T0: i64 = 1_700_000_010;
const HOUR: Duration = Duration::from_secs(3600);

struct Harness {
    coordinator: Coordinator,
    events: mpsc::UnboundedReceiver<CoordinatorEvent>,
    api: Arc<MemoryApi>,
    radio: Arc<SimulatedRadio>,
    clock: Arc<ManualClock>,
    tokens: TokenProvider,
}

impl Harness {
    fn drain_events(&mut self) -> Vec<CoordinatorEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}

fn discoverable() -> EngineSettings {
    EngineSettings {
        is_discoverable: true,
        ..Default::default()
    }
}

fn harness_on(
    air: &SimulatedAir,
    clock: &Arc<ManualClock>,
    seed_byte: u8,
    settings: EngineSettings,
) -> Harness {
    let seed = Seed::new([seed_byte; SEED_LEN], clock.now());
    let seeds = SeedStore::open(
        Arc::new(MemorySeedPersistence::with_seed(seed)),
        clock.clone(),
        Duration::from_secs(86_400),
    )
    .unwrap();
    let config = WtmConfig::default();
    let tokens = TokenProvider::new(Arc::new(seeds), &config.presence);
    let api = Arc::new(MemoryApi::new());
    let radio = Arc::new(air.radio());

    let (coordinator, events) = Coordinator::new(
        Collaborators {
            tokens: tokens.clone(),
            radio: radio.clone(),
            presence_api: api.clone(),
            suggestion_api: api.clone(),
            clock: clock.clone(),
        },
        &config,
        settings,
    );
    Harness {
        coordinator,
        events,
        api,
        radio,
        clock: clock.clone(),
        tokens,
    }
}

fn harness(settings: EngineSettings) -> Harness {
    let clock = Arc::new(ManualClock::at_unix(T0));
    harness_on(&SimulatedAir::new(), &clock, 1, settings)
}

fn pending(count: u32) -> PartySuggestion {
    PartySuggestion {
        id: Uuid::new_v4(),
        group_id: Uuid::new_v4(),
        participant_count: count,
        suggested_at: DateTime::from_timestamp(T0, 0).unwrap(),
        status: PartySuggestionStatus::Pending,
    }
}

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

// ---------------------------------------------------------------------------
// Presence gating
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn stays_off_when_not_discoverable() {
    let mut h = harness(EngineSettings::default());
    h.coordinator.start();
    settle().await;

    assert!(!h.coordinator.is_presence_running());
    assert!(!h.radio.is_scanning());
    assert!(h.radio.advertisement().is_none());
    assert!(h.api.registrations().is_empty());
    assert!(h.drain_events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn start_runs_radio_and_registers_token() {
    let mut h = harness(discoverable());
    h.coordinator.start();
    settle().await;

    assert!(h.coordinator.is_presence_running());
    let status = h.coordinator.radio_status();
    assert!(status.is_scanning && status.is_advertising);

    let registered = h.api.registrations();
    assert_eq!(registered.len(), 1);
    assert_eq!(registered[0], h.tokens.current_token(h.clock.now()));
    assert_eq!(h.drain_events(), vec![CoordinatorEvent::PresenceStarted]);
}

#[tokio::test(start_paused = true)]
async fn repeated_start_is_a_no_op() {
    let mut h = harness(discoverable());
    h.coordinator.start();
    h.coordinator.start();
    h.coordinator.apply_settings(discoverable());
    settle().await;

    assert_eq!(h.api.registrations().len(), 1);
    assert_eq!(h.drain_events(), vec![CoordinatorEvent::PresenceStarted]);
}

#[tokio::test(start_paused = true)]
async fn background_without_permission_stops_presence() {
    let mut h = harness(EngineSettings {
        is_discoverable: true,
        allow_background_detection: false,
        ..Default::default()
    });
    h.coordinator.start();
    h.coordinator.set_app_active(false);
    settle().await;

    assert!(!h.coordinator.is_presence_running());
    assert!(!h.radio.is_scanning());
    assert_eq!(
        h.drain_events(),
        vec![
            CoordinatorEvent::PresenceStarted,
            CoordinatorEvent::PresenceStopped
        ]
    );

    h.coordinator.set_app_active(true);
    assert!(h.coordinator.is_presence_running());
}

#[tokio::test(start_paused = true)]
async fn background_with_permission_keeps_running() {
    let h = harness(discoverable());
    h.coordinator.start();
    h.coordinator.set_app_active(false);
    assert!(h.coordinator.is_presence_running());
}

#[tokio::test(start_paused = true)]
async fn backgrounding_keeps_active_suggestion() {
    let h = harness(EngineSettings {
        is_discoverable: true,
        allow_background_detection: false,
        ..Default::default()
    });
    h.coordinator.start();
    h.coordinator.inject_debug_suggestion(Some(8));
    h.coordinator.set_app_active(false);
    assert!(h.coordinator.active_suggestion().is_some());
}

#[tokio::test(start_paused = true)]
async fn turning_off_discovery_stops_and_clears() {
    let mut h = harness(discoverable());
    h.coordinator.start();
    h.coordinator.inject_debug_suggestion(Some(8));
    h.drain_events();

    h.coordinator.apply_settings(EngineSettings::default());
    assert!(!h.coordinator.is_presence_running());
    assert!(h.coordinator.active_suggestion().is_none());
    assert_eq!(
        h.drain_events(),
        vec![
            CoordinatorEvent::PresenceStopped,
            CoordinatorEvent::SuggestionCleared
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn token_reregistered_every_window() {
    let h = harness(discoverable());
    h.coordinator.start();
    settle().await;
    assert_eq!(h.api.registrations().len(), 1);

    // T0 sits 90s into its window; the first boundary is 30s away.
    h.clock.advance(Duration::from_secs(30));
    tokio::time::sleep(Duration::from_secs(31)).await;
    let registered = h.api.registrations();
    assert_eq!(registered.len(), 2);
    assert_ne!(registered[0].value, registered[1].value);
    assert_eq!(registered[1].expires_at, at(T0 + 30 + 120));

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(h.api.registrations().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_all_timers() {
    let mut h = harness(discoverable());
    h.api.set_pending(Some(pending(5)));
    h.coordinator.start();
    h.coordinator.inject_debug_suggestion(Some(9));
    h.coordinator.stop();
    h.coordinator.stop();
    settle().await;

    let registrations = h.api.registrations().len();
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(h.api.registrations().len(), registrations);
    assert_eq!(h.api.fetch_count(), 0);
    assert!(h.coordinator.active_suggestion().is_none());
    assert!(h.radio.advertisement().is_none());

    let events = h.drain_events();
    assert_eq!(
        events
            .iter()
            .filter(|e| **e == CoordinatorEvent::PresenceStopped)
            .count(),
        1
    );
    assert!(events.contains(&CoordinatorEvent::SuggestionCleared));
}

// ---------------------------------------------------------------------------
// Suggestions
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn poll_picks_up_pending_suggestion() {
    let mut h = harness(discoverable());
    let suggestion = pending(6);
    h.api.set_pending(Some(suggestion.clone()));
    h.coordinator.start();
    settle().await;
    assert_eq!(h.api.fetch_count(), 0);

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(h.api.fetch_count(), 1);
    assert_eq!(h.coordinator.active_suggestion(), Some(suggestion.clone()));
    assert!(h
        .drain_events()
        .contains(&CoordinatorEvent::SuggestionAvailable(suggestion)));

    // Slot is occupied, so later polls skip the fetch.
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(h.api.fetch_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn refresh_respects_guards() {
    let h = harness(EngineSettings {
        is_discoverable: true,
        suggestions_enabled: false,
        ..Default::default()
    });
    h.coordinator.refresh_suggestion_if_needed().await;
    assert_eq!(h.api.fetch_count(), 0, "presence not running");

    h.coordinator.start();
    h.coordinator.refresh_suggestion_if_needed().await;
    assert_eq!(h.api.fetch_count(), 0, "suggestions disabled");

    let h = harness(discoverable());
    h.coordinator.start();
    h.coordinator.inject_debug_suggestion(None);
    h.coordinator.refresh_suggestion_if_needed().await;
    assert_eq!(h.api.fetch_count(), 0, "suggestion already active");
}

#[tokio::test(start_paused = true)]
async fn enabling_suggestions_fetches_immediately() {
    let h = harness(EngineSettings {
        is_discoverable: true,
        suggestions_enabled: false,
        ..Default::default()
    });
    h.coordinator.start();
    h.coordinator.apply_settings(discoverable());
    settle().await;
    assert_eq!(h.api.fetch_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn fetch_failure_leaves_slot_empty() {
    let h = harness(discoverable());
    h.api.set_pending(Some(pending(4)));
    h.api.fail_fetches(true);
    h.coordinator.start();
    h.coordinator.refresh_suggestion_if_needed().await;
    assert_eq!(h.api.fetch_count(), 1);
    assert!(h.coordinator.active_suggestion().is_none());
}

#[tokio::test(start_paused = true)]
async fn late_fetch_result_is_discarded_after_stop() {
    let h = harness(discoverable());
    h.api.set_pending(Some(pending(4)));
    h.api.set_fetch_delay(Some(Duration::from_secs(5)));
    h.coordinator.start();

    let refresh = h.coordinator.refresh_suggestion_if_needed();
    let stop = async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        h.coordinator.apply_settings(EngineSettings::default());
    };
    tokio::join!(refresh, stop);

    assert_eq!(h.api.fetch_count(), 1);
    assert!(h.coordinator.active_suggestion().is_none());
}

#[tokio::test(start_paused = true)]
async fn dismiss_starts_cooldown() {
    let mut h = harness(discoverable());
    h.coordinator.start();
    let suggestion = h.coordinator.inject_debug_suggestion(Some(7));
    h.drain_events();

    assert_eq!(h.coordinator.dismiss(), Some(suggestion.clone()));
    settle().await;

    let updates = h.api.status_updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0, suggestion.id);
    assert_eq!(updates[0].1, PartySuggestionStatus::Dismissed);
    assert_eq!(updates[0].2, at(T0));

    let until = at(T0 + 4 * 3600);
    assert_eq!(
        h.drain_events(),
        vec![
            CoordinatorEvent::SuggestionCleared,
            CoordinatorEvent::CooldownStarted { until }
        ]
    );
    assert_eq!(
        h.coordinator.settings().suggestions_suppressed_until,
        Some(until)
    );

    h.api.set_pending(Some(pending(3)));
    h.clock.advance(HOUR);
    h.coordinator.refresh_suggestion_if_needed().await;
    assert_eq!(h.api.fetch_count(), 0);

    h.clock.set(at(T0 + 4 * 3600 + 1));
    h.coordinator.refresh_suggestion_if_needed().await;
    assert_eq!(h.api.fetch_count(), 1);
    assert!(h.coordinator.active_suggestion().is_some());
}

#[tokio::test(start_paused = true)]
async fn stale_settings_snapshot_keeps_cooldown() {
    let h = harness(discoverable());
    h.coordinator.start();
    let before_answer = h.coordinator.settings();
    h.coordinator.inject_debug_suggestion(Some(5));
    h.coordinator.dismiss();

    h.coordinator.apply_settings(EngineSettings {
        allow_background_detection: false,
        ..before_answer
    });
    assert_eq!(
        h.coordinator.settings().suggestions_suppressed_until,
        Some(at(T0 + 4 * 3600))
    );
    assert!(!h.coordinator.settings().allow_background_detection);

    h.api.set_pending(Some(pending(4)));
    h.clock.advance(HOUR);
    h.coordinator.refresh_suggestion_if_needed().await;
    assert_eq!(h.api.fetch_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn newer_cooldown_from_settings_wins() {
    let h = harness(discoverable());
    h.coordinator.start();
    h.coordinator.inject_debug_suggestion(Some(5));
    h.coordinator.dismiss();

    let later = at(T0 + 8 * 3600);
    h.coordinator.apply_settings(EngineSettings {
        suggestions_suppressed_until: Some(later),
        ..discoverable()
    });
    assert_eq!(
        h.coordinator.settings().suggestions_suppressed_until,
        Some(later)
    );
}

#[tokio::test(start_paused = true)]
async fn clearing_cooldown_fetches_again() {
    let h = harness(discoverable());
    h.coordinator.start();
    h.coordinator.inject_debug_suggestion(Some(5));
    h.coordinator.dismiss();
    h.api.set_pending(Some(pending(4)));

    h.coordinator.clear_suggestion_cooldown();
    settle().await;

    assert!(h
        .coordinator
        .settings()
        .suggestions_suppressed_until
        .is_none());
    assert_eq!(h.api.fetch_count(), 1);
    assert!(h.coordinator.active_suggestion().is_some());
}

#[tokio::test(start_paused = true)]
async fn accept_invokes_create_event_handler() {
    let h = harness(discoverable());
    let created: Arc<Mutex<Vec<PartySuggestion>>> = Arc::default();
    let sink = Arc::clone(&created);
    h.coordinator
        .set_on_create_event(Arc::new(move |s: &PartySuggestion| {
            sink.lock().unwrap().push(s.clone())
        }));

    h.coordinator.start();
    let suggestion = h.coordinator.inject_debug_suggestion(Some(12));
    h.coordinator.accept();
    settle().await;

    assert_eq!(*created.lock().unwrap(), vec![suggestion]);
    assert_eq!(h.api.status_updates()[0].1, PartySuggestionStatus::Accepted);
    assert!(h.coordinator.active_suggestion().is_none());
}

#[tokio::test(start_paused = true)]
async fn private_party_is_reported() {
    let h = harness(discoverable());
    h.coordinator.start();
    h.coordinator.inject_debug_suggestion(Some(12));
    h.coordinator.mark_private_party();
    settle().await;

    assert_eq!(
        h.api.status_updates()[0].1,
        PartySuggestionStatus::PrivateParty
    );
    assert!(h.coordinator.settings().is_in_cooldown(h.clock.now()));
}

#[tokio::test(start_paused = true)]
async fn actions_without_suggestion_do_nothing() {
    let mut h = harness(discoverable());
    h.coordinator.start();
    h.drain_events();

    assert!(h.coordinator.accept().is_none());
    assert!(h.coordinator.mark_private_party().is_none());
    assert!(h.coordinator.dismiss().is_none());
    settle().await;

    assert!(h.api.status_updates().is_empty());
    assert!(h.drain_events().is_empty());
    assert!(h
        .coordinator
        .settings()
        .suggestions_suppressed_until
        .is_none());
}

#[tokio::test(start_paused = true)]
async fn debug_suggestion_counts() {
    let h = harness(discoverable());
    assert_eq!(
        h.coordinator.inject_debug_suggestion(Some(3)).participant_count,
        3
    );
    for _ in 0..50 {
        let s = h.coordinator.inject_debug_suggestion(None);
        assert!((6..=18).contains(&s.participant_count));
        assert_eq!(s.status, PartySuggestionStatus::Pending);
    }
}

#[tokio::test(start_paused = true)]
async fn zero_periods_in_config_do_not_panic() {
    let clock = Arc::new(ManualClock::at_unix(T0));
    let mut config = WtmConfig::default();
    config.presence.rotation_period_secs = 0;
    config.presence.upload_interval_secs = 0;
    config.suggestions.poll_interval_secs = 0;

    let seeds = SeedStore::open(
        Arc::new(MemorySeedPersistence::new()),
        clock.clone(),
        Duration::from_secs(86_400),
    )
    .unwrap();
    let api = Arc::new(MemoryApi::new());
    let (coordinator, _events) = Coordinator::new(
        Collaborators {
            tokens: TokenProvider::new(Arc::new(seeds), &config.presence),
            radio: Arc::new(SimulatedAir::new().radio()),
            presence_api: api.clone(),
            suggestion_api: api.clone(),
            clock: clock.clone(),
        },
        &config,
        discoverable(),
    );
    coordinator.start();
    tokio::time::sleep(Duration::from_millis(2500)).await;

    assert!(coordinator.is_presence_running());
    assert!(api.fetch_count() >= 2);
    coordinator.stop();
}

// ---------------------------------------------------------------------------
// End to end
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn two_devices_produce_one_upload() {
    let clock = Arc::new(ManualClock::at_unix(T0));
    let air = SimulatedAir::new();
    let a = harness_on(&air, &clock, 0xA1, discoverable());
    let b = harness_on(&air, &clock, 0xB2, discoverable());
    a.coordinator.start();
    b.coordinator.start();

    let a_token = a.coordinator.current_token().value;
    let b_token = b.coordinator.current_token().value;
    assert_ne!(a_token, b_token);

    air.sweep();
    settle().await;
    assert_eq!(a.coordinator.pending_sightings(), 1);

    // Repeated advertisements inside the dedupe window are ignored.
    air.sweep();
    settle().await;
    assert_eq!(a.coordinator.pending_sightings(), 1);

    tokio::time::sleep(Duration::from_secs(20)).await;
    let batches = a.api.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 1);
    assert_eq!(batches[0][0].observer_token, a_token);
    assert_eq!(batches[0][0].seen_token, b_token);
    assert_eq!(a.coordinator.pending_sightings(), 0);
}
