//! Engine harness over simulated players
//!
//! All tests using the harness run with `#[tokio::test(start_paused = true)]`:
//! the clock only moves when every task is idle, so engine timers fire at
//! exact instants and [`EngineHarness::at`] observes the state between them.

use std::collections::HashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Duration, Instant};
use ytdj_common::events::TransitionEvent;
use ytdj_common::model::entries_from_tracks;
use ytdj_common::{PlaylistEntry, Track, TransitionSettings};
use ytdj_player::sim::{SimProbe, SimulatedPlayer};
use ytdj_player::{EngineConfig, TransitionEngine, TransitionEngineHandle, TransitionState};

pub struct HarnessBuilder {
    tracks: Vec<Track>,
    settings: TransitionSettings,
    master_volume: u8,
    failing: Vec<String>,
    manual_ready: bool,
}

impl HarnessBuilder {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self {
            tracks,
            settings: TransitionSettings::default(),
            master_volume: 80,
            failing: Vec::new(),
            manual_ready: false,
        }
    }

    pub fn settings(mut self, settings: TransitionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn master_volume(mut self, volume: u8) -> Self {
        self.master_volume = volume;
        self
    }

    /// Media ids whose load fails with a widget error
    pub fn failing(mut self, media_ids: &[&str]) -> Self {
        self.failing = media_ids.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Players wait for `signal_ready` instead of readying on subscribe
    pub fn manual_ready(mut self) -> Self {
        self.manual_ready = true;
        self
    }

    pub fn spawn(self) -> EngineHarness {
        let catalog: HashMap<String, f64> = self
            .tracks
            .iter()
            .map(|t| (t.media_id.clone(), t.duration_secs))
            .collect();

        let build = |catalog: HashMap<String, f64>| {
            let player = SimulatedPlayer::new(catalog).failing(self.failing.clone());
            if self.manual_ready {
                player.manual_ready()
            } else {
                player
            }
        };
        let player_a = build(catalog.clone());
        let player_b = build(catalog);
        let probe_a = player_a.probe();
        let probe_b = player_b.probe();

        let entries = entries_from_tracks(self.tracks);
        let config = EngineConfig {
            settings: self.settings,
            master_volume: self.master_volume,
            event_capacity: 1024,
        };
        let (handle, task) = TransitionEngine::spawn(
            entries.clone(),
            Box::new(player_a),
            Box::new(player_b),
            config,
        );
        let events = handle.subscribe();

        EngineHarness {
            handle,
            task,
            probe_a,
            probe_b,
            events,
            entries,
            start: Instant::now(),
        }
    }
}

pub struct EngineHarness {
    pub handle: TransitionEngineHandle,
    pub task: JoinHandle<()>,
    pub probe_a: SimProbe,
    pub probe_b: SimProbe,
    pub events: broadcast::Receiver<TransitionEvent>,
    pub entries: Vec<PlaylistEntry>,
    /// Time zero for [`EngineHarness::at`]
    pub start: Instant,
}

impl EngineHarness {
    /// Advance the paused clock to `secs` after the harness started
    pub async fn at(&self, secs: f64) -> TransitionState {
        sleep_until(self.start + Duration::from_secs_f64(secs)).await;
        self.handle.state()
    }

    /// Let the engine process anything already queued
    pub async fn settle(&self) -> TransitionState {
        sleep_until(Instant::now() + Duration::from_millis(1)).await;
        self.handle.state()
    }

    pub fn entry_id(&self, index: usize) -> uuid::Uuid {
        self.entries[index].id
    }

    /// Every event received so far
    pub fn drain_events(&mut self) -> Vec<TransitionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    pub async fn shutdown(self) {
        self.handle.shutdown().await.unwrap();
        self.task.await.unwrap();
    }
}

/// Variant name of an event, for compact sequence assertions
pub fn event_name(event: &TransitionEvent) -> &'static str {
    match event {
        TransitionEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
        TransitionEvent::TrackStarted { .. } => "TrackStarted",
        TransitionEvent::TrackPreloaded { .. } => "TrackPreloaded",
        TransitionEvent::CrossfadeStarted { .. } => "CrossfadeStarted",
        TransitionEvent::CrossfadeCompleted { .. } => "CrossfadeCompleted",
        TransitionEvent::CrossfadeAbandoned { .. } => "CrossfadeAbandoned",
        TransitionEvent::FallbackAdvance { .. } => "FallbackAdvance",
        TransitionEvent::TrackSkipped { .. } => "TrackSkipped",
        TransitionEvent::ActiveIndexChanged { .. } => "ActiveIndexChanged",
        TransitionEvent::PlaylistFinished { .. } => "PlaylistFinished",
    }
}
