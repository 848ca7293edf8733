//! Simulated media player
//!
//! In-process stand-in for the embeddable video widget, driven by tokio
//! time. Used by the demo binary and the test suites: under a paused test
//! clock, positions advance exactly with `tokio::time::advance`/sleeps.
//!
//! Behaviour mirrors the widget contract:
//! - `Ready` is emitted on subscription (or on [`SimProbe::signal_ready`]
//!   for players built with [`SimulatedPlayer::manual_ready`])
//! - loading an unknown or failing media id emits `Error(100)`
//! - playback reaching the media duration emits `StateChanged(Ended)`
//!
//! A [`SimProbe`] shares the player's state for inspection.

use crate::error::SlotError;
use crate::slot::{MediaPlayer, PlayerState, SlotEvent, SlotListener};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::{Duration, Instant};
use tracing::trace;

/// Error code emitted for media that cannot be found or played
pub const MEDIA_NOT_FOUND: i32 = 100;

/// Journal entry for every call that reached the simulated widget
#[derive(Debug, Clone, PartialEq)]
pub enum SimCall {
    Load { media_id: String, start_secs: f64 },
    Play,
    Pause,
    Seek(f64),
    SetVolume(u8),
}

#[derive(Debug)]
struct SimState {
    catalog: HashMap<String, f64>,
    failing: HashSet<String>,
    auto_ready: bool,
    ready: bool,
    /// Reject `set_volume` calls
    volume_locked: bool,
    listener: Option<SlotListener>,
    media_id: Option<String>,
    duration: Option<f64>,
    base_position: f64,
    playing_since: Option<Instant>,
    volume: u8,
    /// Bumped on every position-affecting call; stale end timers compare it
    generation: u64,
    player_state: PlayerState,
    calls: Vec<SimCall>,
}

impl SimState {
    fn position(&self) -> f64 {
        let elapsed = self
            .playing_since
            .map(|since| since.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        let position = self.base_position + elapsed;
        match self.duration {
            Some(duration) => position.min(duration),
            None => position,
        }
    }

    fn emit(&self, event: SlotEvent) {
        if let Some(listener) = &self.listener {
            listener.emit(event);
        }
    }
}

fn lock(state: &Arc<Mutex<SimState>>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Simulated embeddable player
pub struct SimulatedPlayer {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedPlayer {
    /// Create a player that knows the given media ids and their durations
    pub fn new(catalog: HashMap<String, f64>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                catalog,
                failing: HashSet::new(),
                auto_ready: true,
                ready: false,
                volume_locked: false,
                listener: None,
                media_id: None,
                duration: None,
                base_position: 0.0,
                playing_since: None,
                volume: 100,
                generation: 0,
                player_state: PlayerState::Unstarted,
                calls: Vec::new(),
            })),
        }
    }

    /// Media ids that fail to load even though they are in the catalog
    pub fn failing<I, S>(self, media_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        lock(&self.state)
            .failing
            .extend(media_ids.into_iter().map(Into::into));
        self
    }

    /// Do not signal ready on subscription; wait for [`SimProbe::signal_ready`]
    pub fn manual_ready(self) -> Self {
        lock(&self.state).auto_ready = false;
        self
    }

    /// Inspection handle sharing this player's state
    pub fn probe(&self) -> SimProbe {
        SimProbe {
            state: Arc::clone(&self.state),
        }
    }

    /// Schedule the natural-end event for the current play run
    fn arm_end_timer(&self, state: &SimState) {
        let (Some(duration), Some(_)) = (state.duration, state.playing_since) else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            trace!("No runtime, end timer not armed");
            return;
        };

        let remaining = (duration - state.position()).max(0.0);
        let generation = state.generation;
        let shared = Arc::clone(&self.state);

        runtime.spawn(async move {
            tokio::time::sleep(Duration::from_secs_f64(remaining)).await;
            let mut s = lock(&shared);
            if s.generation != generation || s.playing_since.is_none() {
                return;
            }
            s.base_position = duration;
            s.playing_since = None;
            s.player_state = PlayerState::Ended;
            s.emit(SlotEvent::StateChanged(PlayerState::Ended));
        });
    }
}

impl MediaPlayer for SimulatedPlayer {
    fn load(&mut self, media_id: &str, start_secs: f64) -> Result<(), SlotError> {
        let mut s = lock(&self.state);
        if !s.ready {
            return Err(SlotError::NotReady);
        }
        s.calls.push(SimCall::Load {
            media_id: media_id.to_string(),
            start_secs,
        });
        s.generation += 1;
        s.playing_since = None;

        let duration = s.catalog.get(media_id).copied();
        match duration {
            Some(duration) if !s.failing.contains(media_id) => {
                // Bad catalog durations collapse to zero-length media
                let duration = duration.max(0.0);
                s.media_id = Some(media_id.to_string());
                s.duration = Some(duration);
                s.base_position = start_secs.clamp(0.0, duration);
                s.player_state = PlayerState::Paused;
            }
            _ => {
                s.media_id = None;
                s.duration = None;
                s.base_position = 0.0;
                s.player_state = PlayerState::Unstarted;
                s.emit(SlotEvent::Error(MEDIA_NOT_FOUND));
            }
        }
        Ok(())
    }

    fn play(&mut self) -> Result<(), SlotError> {
        let mut s = lock(&self.state);
        if !s.ready {
            return Err(SlotError::NotReady);
        }
        if s.media_id.is_none() {
            return Err(SlotError::Rejected("no media loaded".to_string()));
        }
        s.calls.push(SimCall::Play);
        if s.playing_since.is_some() {
            return Ok(());
        }

        if s.player_state == PlayerState::Ended {
            s.base_position = 0.0;
        }
        s.generation += 1;
        s.playing_since = Some(Instant::now());
        s.player_state = PlayerState::Playing;
        s.emit(SlotEvent::StateChanged(PlayerState::Playing));
        self.arm_end_timer(&s);
        Ok(())
    }

    fn pause(&mut self) -> Result<(), SlotError> {
        let mut s = lock(&self.state);
        if !s.ready {
            return Err(SlotError::NotReady);
        }
        s.calls.push(SimCall::Pause);
        if s.playing_since.is_none() {
            return Ok(());
        }

        s.base_position = s.position();
        s.playing_since = None;
        s.generation += 1;
        s.player_state = PlayerState::Paused;
        s.emit(SlotEvent::StateChanged(PlayerState::Paused));
        Ok(())
    }

    fn seek(&mut self, secs: f64) -> Result<(), SlotError> {
        let mut s = lock(&self.state);
        if !s.ready {
            return Err(SlotError::NotReady);
        }
        s.calls.push(SimCall::Seek(secs));

        let limit = s.duration.unwrap_or(f64::MAX).max(0.0);
        s.base_position = secs.clamp(0.0, limit);
        s.generation += 1;
        if s.playing_since.is_some() {
            s.playing_since = Some(Instant::now());
            self.arm_end_timer(&s);
        } else if s.player_state == PlayerState::Ended {
            s.player_state = PlayerState::Paused;
        }
        Ok(())
    }

    fn set_volume(&mut self, volume: u8) -> Result<(), SlotError> {
        let mut s = lock(&self.state);
        if !s.ready {
            return Err(SlotError::NotReady);
        }
        if s.volume_locked {
            return Err(SlotError::Rejected("volume locked".to_string()));
        }
        s.calls.push(SimCall::SetVolume(volume));
        s.volume = volume.min(100);
        Ok(())
    }

    fn current_time(&self) -> Option<f64> {
        let s = lock(&self.state);
        s.media_id.as_ref()?;
        Some(s.position())
    }

    fn duration(&self) -> Option<f64> {
        lock(&self.state).duration
    }

    fn subscribe(&mut self, listener: SlotListener) {
        let mut s = lock(&self.state);
        s.listener = Some(listener);
        if s.auto_ready {
            s.ready = true;
            s.emit(SlotEvent::Ready);
        }
    }

    fn unsubscribe(&mut self) {
        lock(&self.state).listener = None;
    }
}

/// Shared view into a [`SimulatedPlayer`]
#[derive(Clone)]
pub struct SimProbe {
    state: Arc<Mutex<SimState>>,
}

impl SimProbe {
    pub fn calls(&self) -> Vec<SimCall> {
        lock(&self.state).calls.clone()
    }

    /// Number of load calls that reached the widget
    pub fn load_count(&self) -> usize {
        lock(&self.state)
            .calls
            .iter()
            .filter(|c| matches!(c, SimCall::Load { .. }))
            .count()
    }

    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }

    pub fn volume(&self) -> u8 {
        lock(&self.state).volume
    }

    pub fn position(&self) -> f64 {
        lock(&self.state).position()
    }

    pub fn is_playing(&self) -> bool {
        lock(&self.state).playing_since.is_some()
    }

    pub fn player_state(&self) -> PlayerState {
        lock(&self.state).player_state
    }

    pub fn media_id(&self) -> Option<String> {
        lock(&self.state).media_id.clone()
    }

    pub fn is_subscribed(&self) -> bool {
        lock(&self.state).listener.is_some()
    }

    /// Finish widget initialization and emit `Ready`
    pub fn signal_ready(&self) {
        let mut s = lock(&self.state);
        s.ready = true;
        s.emit(SlotEvent::Ready);
    }

    /// Make subsequent `set_volume` calls fail (or succeed again)
    pub fn lock_volume(&self, locked: bool) {
        lock(&self.state).volume_locked = locked;
    }

    /// Emit a widget error for the loaded media
    pub fn signal_error(&self, code: i32) {
        lock(&self.state).emit(SlotEvent::Error(code));
    }

    /// Jump to the end of the media and emit `Ended`
    pub fn finish_now(&self) {
        let mut s = lock(&self.state);
        if let Some(duration) = s.duration {
            s.base_position = duration;
        }
        s.playing_since = None;
        s.generation += 1;
        s.player_state = PlayerState::Ended;
        s.emit(SlotEvent::StateChanged(PlayerState::Ended));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::{SlotId, SlotNotice};
    use tokio::sync::mpsc;

    fn player() -> SimulatedPlayer {
        SimulatedPlayer::new(HashMap::from([
            ("short".to_string(), 3.0),
            ("broken".to_string(), 60.0),
        ]))
        .failing(["broken"])
    }

    #[tokio::test(start_paused = true)]
    async fn test_position_follows_clock() {
        let mut p = player();
        let probe = p.probe();
        let (tx, _rx) = mpsc::unbounded_channel();
        p.subscribe(SlotListener::new(SlotId::A, tx));

        p.load("short", 0.5).unwrap();
        assert_eq!(p.current_time(), Some(0.5));
        p.play().unwrap();
        tokio::time::advance(Duration::from_millis(1000)).await;
        assert!((probe.position() - 1.5).abs() < 1e-9);

        p.pause().unwrap();
        tokio::time::advance(Duration::from_millis(1000)).await;
        assert!((probe.position() - 1.5).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_natural_end_emits_ended() {
        let mut p = player();
        let (tx, mut rx) = mpsc::unbounded_channel();
        p.subscribe(SlotListener::new(SlotId::B, tx));
        assert_eq!(rx.recv().await.unwrap().event, SlotEvent::Ready);

        p.load("short", 0.0).unwrap();
        p.play().unwrap();
        assert_eq!(
            rx.recv().await.unwrap().event,
            SlotEvent::StateChanged(PlayerState::Playing)
        );

        let notice = rx.recv().await.unwrap();
        assert_eq!(
            notice,
            SlotNotice {
                slot: SlotId::B,
                event: SlotEvent::StateChanged(PlayerState::Ended)
            }
        );
        assert_eq!(p.current_time(), Some(3.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_cancels_end_timer() {
        let mut p = player();
        let (tx, mut rx) = mpsc::unbounded_channel();
        p.subscribe(SlotListener::new(SlotId::A, tx));
        p.load("short", 0.0).unwrap();
        p.play().unwrap();
        p.pause().unwrap();

        tokio::time::sleep(Duration::from_secs(10)).await;
        let mut events = Vec::new();
        while let Ok(notice) = rx.try_recv() {
            events.push(notice.event);
        }
        assert!(!events.contains(&SlotEvent::StateChanged(PlayerState::Ended)));
    }

    #[test]
    fn test_failing_media_emits_error() {
        let mut p = player();
        let (tx, mut rx) = mpsc::unbounded_channel();
        p.subscribe(SlotListener::new(SlotId::A, tx));
        let _ = rx.try_recv();

        p.load("broken", 0.0).unwrap();
        assert_eq!(rx.try_recv().unwrap().event, SlotEvent::Error(MEDIA_NOT_FOUND));
        assert_eq!(p.current_time(), None);

        p.load("unknown", 0.0).unwrap();
        assert_eq!(rx.try_recv().unwrap().event, SlotEvent::Error(MEDIA_NOT_FOUND));
    }

    #[tokio::test(start_paused = true)]
    async fn test_negative_catalog_duration_does_not_panic() {
        let mut p = SimulatedPlayer::new(HashMap::from([("x".to_string(), -5.0)]));
        let (tx, _rx) = mpsc::unbounded_channel();
        p.subscribe(SlotListener::new(SlotId::A, tx));

        p.load("x", 0.0).unwrap();
        assert_eq!(p.duration(), Some(0.0));
        p.seek(3.0).unwrap();
        assert_eq!(p.current_time(), Some(0.0));
        p.play().unwrap();
    }

    #[test]
    fn test_locked_volume_is_rejected() {
        let mut p = player();
        let probe = p.probe();
        let (tx, _rx) = mpsc::unbounded_channel();
        p.subscribe(SlotListener::new(SlotId::A, tx));

        probe.lock_volume(true);
        assert!(matches!(p.set_volume(10), Err(SlotError::Rejected(_))));
        assert_eq!(probe.volume(), 100);

        probe.lock_volume(false);
        p.set_volume(10).unwrap();
        assert_eq!(probe.volume(), 10);
    }

    #[test]
    fn test_not_ready_before_subscription() {
        let mut p = player();
        assert_eq!(p.play(), Err(SlotError::NotReady));
        assert_eq!(p.set_volume(10), Err(SlotError::NotReady));
    }
}
