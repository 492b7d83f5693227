//! Long-running presence engine.
//!
//! No platform radio is linked into this binary: the local device and any
//! `--loopback` peers share a [`SimulatedAir`] that is swept once a second.
//! Suggestions are answered by typing `accept`, `private` or `dismiss` on stdin.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use wtm_common::{Clock, SystemClock, WtmError};
use wtm_config::{
    paths, spawn_settings_reload, EngineSettings, SettingsStore, SupabaseConfig, WtmConfig,
};
use wtm_presence::{
    Collaborators, Coordinator, CoordinatorEvent, FileSeedPersistence, MemoryApi,
    MemorySeedPersistence, PartySuggestion, PresenceApi, SeedStore, SimulatedAir, SuggestionApi,
    SupabaseClient, TokenProvider,
};

const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// RSSI spread for loopback peers; the weaker end falls below the default filter.
const LOOPBACK_RSSI: std::ops::RangeInclusive<i16> = -85..=-40;

pub struct RunOptions {
    pub loopback: usize,
    pub background: bool,
    pub debug_suggestion: bool,
}

pub async fn run(config: WtmConfig, opts: RunOptions) -> Result<(), WtmError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let seeds = SeedStore::open(
        Arc::new(FileSeedPersistence::new(paths::seed_file()?)),
        clock.clone(),
        config.presence.seed_rotation(),
    )?;
    let tokens = TokenProvider::new(Arc::new(seeds), &config.presence);

    let settings = Arc::new(SettingsStore::load(paths::settings_file()?)?);
    let mut settings_rx = settings.subscribe();
    let initial = settings_rx.borrow_and_update().clone();
    let reload = match spawn_settings_reload(settings.clone()) {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "settings file will not be watched");
            None
        }
    };

    let (presence_api, suggestion_api) = backend(&config.supabase)?;
    let air = SimulatedAir::new();
    let (coordinator, mut events) = Coordinator::new(
        Collaborators {
            tokens,
            radio: Arc::new(air.radio()),
            presence_api,
            suggestion_api,
            clock: clock.clone(),
        },
        &config,
        initial.clone(),
    );
    let coordinator = Arc::new(coordinator);
    coordinator.set_on_create_event(Arc::new(|suggestion: &PartySuggestion| {
        info!(
            group_id = %suggestion.group_id,
            participant_count = suggestion.participant_count,
            "create-event requested for accepted suggestion"
        );
    }));

    if opts.background {
        coordinator.set_app_active(false);
    }
    coordinator.start();
    if !coordinator.is_presence_running() {
        info!("presence is off; enable it with `wtm-presenced settings set is_discoverable true`");
    }
    if opts.debug_suggestion {
        coordinator.inject_debug_suggestion(None);
    }

    let peers = spawn_loopback_peers(&air, &config, clock.clone(), opts.loopback)?;
    let mut tasks: Vec<JoinHandle<()>> = reload.into_iter().collect();
    if !peers.is_empty() {
        info!(peers = peers.len(), "loopback peers online");
        let air = air.clone();
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                let delivered = air.sweep();
                debug!(delivered, "simulated air swept");
            }
        }));
    }

    let follower = Arc::clone(&coordinator);
    let mut had_cooldown = initial.suggestions_suppressed_until.is_some();
    tasks.push(tokio::spawn(async move {
        while settings_rx.changed().await.is_ok() {
            let snapshot = settings_rx.borrow_and_update().clone();
            follow_settings(&follower, &mut had_cooldown, snapshot);
        }
    }));

    let mut answers = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    error!(error = %e, "failed to listen for Ctrl-C");
                }
                info!("shutting down");
                break;
            }
            Some(event) = events.recv() => handle_event(&settings, event),
            line = answers.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    answer(&coordinator, &line);
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!(error = %e, "stdin unreadable, suggestions can no longer be answered");
                    stdin_open = false;
                }
            },
        }
    }

    for task in tasks {
        task.abort();
    }
    coordinator.stop();
    for peer in &peers {
        peer.stop();
    }
    Ok(())
}

fn backend(
    config: &SupabaseConfig,
) -> Result<(Arc<dyn PresenceApi>, Arc<dyn SuggestionApi>), WtmError> {
    if config.is_configured() {
        let client = Arc::new(
            SupabaseClient::new(config.clone()).map_err(|e| WtmError::Network(e.to_string()))?,
        );
        info!(url = %config.url, "using Supabase backend");
        let presence: Arc<dyn PresenceApi> = client.clone();
        let suggestions: Arc<dyn SuggestionApi> = client;
        Ok((presence, suggestions))
    } else {
        warn!("supabase is not configured; sightings stay in memory");
        let api = Arc::new(MemoryApi::new());
        let presence: Arc<dyn PresenceApi> = api.clone();
        let suggestions: Arc<dyn SuggestionApi> = api;
        Ok((presence, suggestions))
    }
}

fn handle_event(settings: &SettingsStore, event: CoordinatorEvent) {
    match event {
        CoordinatorEvent::CooldownStarted { until } => {
            if let Err(e) = settings.update(|s| s.suggestions_suppressed_until = Some(until)) {
                error!(error = %e, "failed to persist suggestion cooldown");
            }
        }
        CoordinatorEvent::SuggestionAvailable(suggestion) => info!(
            id = %suggestion.id,
            "{} Want to make an event? [accept/private/dismiss]",
            prompt(&suggestion)
        ),
        other => debug!(?other, "coordinator event"),
    }
}

fn prompt(suggestion: &PartySuggestion) -> String {
    match suggestion.participant_count {
        0 => "You and others are nearby.".to_string(),
        n => format!("You and at least {n} people are nearby."),
    }
}

/// Answer the active suggestion from one line of user input.
fn answer(coordinator: &Coordinator, line: &str) -> Option<PartySuggestion> {
    let answered = match line.trim() {
        "" => return None,
        "accept" | "a" => coordinator.accept(),
        "private" | "p" => coordinator.mark_private_party(),
        "dismiss" | "d" => coordinator.dismiss(),
        other => {
            warn!(input = other, "expected accept, private or dismiss");
            return None;
        }
    };
    if answered.is_none() {
        info!("no suggestion to answer");
    }
    answered
}

/// Hand a settings snapshot to the coordinator.
///
/// The coordinator keeps a running cooldown against older snapshots, so a
/// cooldown that disappears from the store is cleared explicitly.
fn follow_settings(coordinator: &Coordinator, had_cooldown: &mut bool, snapshot: EngineSettings) {
    let cleared = *had_cooldown && snapshot.suggestions_suppressed_until.is_none();
    *had_cooldown = snapshot.suggestions_suppressed_until.is_some();
    coordinator.apply_settings(snapshot);
    if cleared {
        coordinator.clear_suggestion_cooldown();
    }
}

/// Ephemeral devices with throwaway seeds and an in-memory backend.
fn spawn_loopback_peers(
    air: &SimulatedAir,
    config: &WtmConfig,
    clock: Arc<dyn Clock>,
    count: usize,
) -> Result<Vec<Coordinator>, WtmError> {
    let mut rng = rand::thread_rng();
    let mut peers = Vec::with_capacity(count);
    for _ in 0..count {
        let (peer, _events) = offline_coordinator(
            air,
            config,
            clock.clone(),
            rng.gen_range(LOOPBACK_RSSI),
            EngineSettings {
                is_discoverable: true,
                suggestions_enabled: false,
                ..Default::default()
            },
        )?;
        peer.start();
        peers.push(peer);
    }
    Ok(peers)
}

fn offline_coordinator(
    air: &SimulatedAir,
    config: &WtmConfig,
    clock: Arc<dyn Clock>,
    rssi: i16,
    settings: EngineSettings,
) -> Result<(Coordinator, mpsc::UnboundedReceiver<CoordinatorEvent>), WtmError> {
    let seeds = SeedStore::open(
        Arc::new(MemorySeedPersistence::new()),
        clock.clone(),
        config.presence.seed_rotation(),
    )?;
    let api = Arc::new(MemoryApi::new());
    Ok(Coordinator::new(
        Collaborators {
            tokens: TokenProvider::new(Arc::new(seeds), &config.presence),
            radio: Arc::new(air.radio_with_rssi(rssi)),
            presence_api: api.clone(),
            suggestion_api: api,
            clock,
        },
        config,
        settings,
    ))
}
