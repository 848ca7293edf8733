//! Transition engine driver
//!
//! Owns the [`PlaybackContext`] and every timer, and runs them on a single
//! tokio task. Work arrives from three places:
//!
//! - slot events (ready, state changes, errors) from the two media players
//! - commands from any [`TransitionEngineHandle`]
//! - timers: position poll, crossfade step, preload settle
//!
//! Sources are polled in that order (`biased`), so a slot's `Ready` is
//! always seen before a command that depends on it. After each event the
//! state snapshot is republished on a `watch` channel.

use crate::context::{PlaybackContext, TransitionState};
use crate::cursor::PlaylistCursor;
use crate::error::{Error, Result};
use crate::scheduler::{SchedulerOutcome, SkipDirection, TransitionScheduler};
use crate::slot::{MediaPlayer, PlaybackSlot, PlayerState, SlotEvent, SlotId, SlotNotice};
use std::future::pending;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, Interval, MissedTickBehavior, Sleep};
use tracing::{debug, info, trace, warn};
use ytdj_common::config::TomlConfig;
use ytdj_common::events::{EventBus, TransitionEvent};
use ytdj_common::{PlaylistEntry, TransitionSettings};

/// Commands accepted by the engine task
#[derive(Debug)]
pub enum EngineCommand {
    /// Start, resume, or jump to an index
    Play { index: Option<usize> },
    Pause,
    Stop,
    Skip(SkipDirection),
    SetVolume(u8),
    ReplacePlaylist {
        entries: Vec<PlaylistEntry>,
        reply: oneshot::Sender<Result<()>>,
    },
    UpdateSettings(TransitionSettings),
    Shutdown { reply: oneshot::Sender<()> },
}

/// Engine construction parameters
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub settings: TransitionSettings,
    /// Initial master volume (0-100)
    pub master_volume: u8,
    /// Event bus buffer size
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            settings: TransitionSettings::default(),
            master_volume: 80,
            event_capacity: 256,
        }
    }
}

impl From<&TomlConfig> for EngineConfig {
    fn from(config: &TomlConfig) -> Self {
        Self {
            settings: config.transition.clone(),
            master_volume: config.master_volume,
            ..Default::default()
        }
    }
}

/// Cloneable control surface for a running engine
///
/// Commands are fire-and-forget except where a reply is needed. Every call
/// fails with [`Error::EngineClosed`] once the engine task has exited.
#[derive(Debug, Clone)]
pub struct TransitionEngineHandle {
    commands: mpsc::UnboundedSender<EngineCommand>,
    state: watch::Receiver<TransitionState>,
    events: EventBus,
}

impl TransitionEngineHandle {
    fn send(&self, command: EngineCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| Error::EngineClosed)
    }

    /// Start playback, resume, or (with an index) jump to an entry
    pub fn play(&self, index: Option<usize>) -> Result<()> {
        self.send(EngineCommand::Play { index })
    }

    pub fn pause(&self) -> Result<()> {
        self.send(EngineCommand::Pause)
    }

    pub fn stop(&self) -> Result<()> {
        self.send(EngineCommand::Stop)
    }

    pub fn skip_next(&self) -> Result<()> {
        self.send(EngineCommand::Skip(SkipDirection::Next))
    }

    pub fn skip_previous(&self) -> Result<()> {
        self.send(EngineCommand::Skip(SkipDirection::Previous))
    }

    pub fn set_volume(&self, volume: u8) -> Result<()> {
        self.send(EngineCommand::SetVolume(volume))
    }

    /// Apply a playlist edit; rejected if it removes the active entry
    pub async fn replace_playlist(&self, entries: Vec<PlaylistEntry>) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::ReplacePlaylist { entries, reply })?;
        rx.await.map_err(|_| Error::EngineClosed)?
    }

    pub fn update_settings(&self, settings: TransitionSettings) -> Result<()> {
        self.send(EngineCommand::UpdateSettings(settings))
    }

    /// Stop playback, clear timers and unsubscribe both slots
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::Shutdown { reply })?;
        rx.await.map_err(|_| Error::EngineClosed)
    }

    /// Latest published state snapshot
    pub fn state(&self) -> TransitionState {
        self.state.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<TransitionState> {
        self.state.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransitionEvent> {
        self.events.subscribe()
    }
}

pub struct TransitionEngine {
    ctx: PlaybackContext,
    scheduler: TransitionScheduler,
    commands: mpsc::UnboundedReceiver<EngineCommand>,
    slot_events: mpsc::UnboundedReceiver<SlotNotice>,
    state_tx: watch::Sender<TransitionState>,
    /// Position poll; only while playing with crossfades enabled
    poll: Option<Interval>,
    /// Crossfade step timer; only while crossfading
    crossfade: Option<Interval>,
    /// Delay before preloading after a role swap
    settle: Option<Pin<Box<Sleep>>>,
}

impl TransitionEngine {
    /// Build an engine over two media players without starting it
    pub fn new(
        entries: Vec<PlaylistEntry>,
        player_a: Box<dyn MediaPlayer>,
        player_b: Box<dyn MediaPlayer>,
        config: EngineConfig,
    ) -> (Self, TransitionEngineHandle) {
        let events = EventBus::new(config.event_capacity.max(1));
        let mut ctx = PlaybackContext::new(
            PlaylistCursor::new(entries),
            config.settings,
            config.master_volume,
            events.clone(),
            PlaybackSlot::new(SlotId::A, player_a),
            PlaybackSlot::new(SlotId::B, player_b),
        );

        let (slot_tx, slot_events) = mpsc::unbounded_channel();
        ctx.subscribe_slots(&slot_tx);

        let (command_tx, commands) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ctx.state.clone());

        let engine = Self {
            ctx,
            scheduler: TransitionScheduler::new(),
            commands,
            slot_events,
            state_tx,
            poll: None,
            crossfade: None,
            settle: None,
        };
        let handle = TransitionEngineHandle {
            commands: command_tx,
            state: state_rx,
            events,
        };
        (engine, handle)
    }

    /// Build and spawn the engine on the current runtime
    pub fn spawn(
        entries: Vec<PlaylistEntry>,
        player_a: Box<dyn MediaPlayer>,
        player_b: Box<dyn MediaPlayer>,
        config: EngineConfig,
    ) -> (TransitionEngineHandle, JoinHandle<()>) {
        let (engine, handle) = Self::new(entries, player_a, player_b, config);
        let task = tokio::spawn(engine.run());
        (handle, task)
    }

    /// Event loop; returns after shutdown or when every handle is dropped
    pub async fn run(mut self) {
        info!(
            "Transition engine started with {} entries",
            self.ctx.cursor.len()
        );

        loop {
            tokio::select! {
                biased;

                Some(notice) = self.slot_events.recv() => {
                    self.handle_slot_event(notice);
                }

                command = self.commands.recv() => match command {
                    Some(EngineCommand::Shutdown { reply }) => {
                        self.teardown();
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("All engine handles dropped");
                        self.teardown();
                        break;
                    }
                },

                _ = next_tick(&mut self.crossfade) => {
                    let outcome = self.scheduler.step_crossfade(&mut self.ctx);
                    self.apply(outcome);
                }

                _ = next_tick(&mut self.poll) => {
                    let outcome = self.scheduler.poll(&mut self.ctx);
                    self.apply(outcome);
                }

                _ = settle(&mut self.settle) => {
                    self.preload_now();
                }
            }

            self.sync_timers();
            self.publish();
        }

        info!("Transition engine stopped");
    }

    fn handle_slot_event(&mut self, notice: SlotNotice) {
        let SlotNotice { slot, event } = notice;
        let outcome = match event {
            SlotEvent::Ready => {
                self.scheduler.on_ready(&mut self.ctx, slot);
                SchedulerOutcome::Idle
            }
            SlotEvent::StateChanged(PlayerState::Ended) => {
                self.scheduler.on_ended(&mut self.ctx, slot)
            }
            SlotEvent::StateChanged(state) => {
                trace!("Slot {} state {:?}", slot, state);
                SchedulerOutcome::Idle
            }
            SlotEvent::Error(code) => self.scheduler.on_load_failure(&mut self.ctx, slot, code),
        };
        self.apply(outcome);
    }

    fn handle_command(&mut self, command: EngineCommand) {
        debug!("Engine command: {:?}", command);
        let outcome = match command {
            EngineCommand::Play { index } => self.scheduler.start(&mut self.ctx, index),
            EngineCommand::Pause => self.scheduler.pause(&mut self.ctx),
            EngineCommand::Stop => {
                self.settle = None;
                self.scheduler.stop(&mut self.ctx)
            }
            EngineCommand::Skip(direction) => self.scheduler.skip(&mut self.ctx, direction),
            EngineCommand::SetVolume(volume) => {
                self.scheduler.set_master_volume(&mut self.ctx, volume);
                SchedulerOutcome::Idle
            }
            EngineCommand::ReplacePlaylist { entries, reply } => {
                match self.scheduler.replace_playlist(&mut self.ctx, entries) {
                    Ok(outcome) => {
                        let _ = reply.send(Ok(()));
                        outcome
                    }
                    Err(e) => {
                        warn!("Playlist edit rejected: {}", e);
                        let _ = reply.send(Err(e));
                        SchedulerOutcome::Idle
                    }
                }
            }
            EngineCommand::UpdateSettings(settings) => {
                self.scheduler.update_settings(&mut self.ctx, settings);
                // Re-created by sync_timers with the new cadence
                self.poll = None;
                SchedulerOutcome::Idle
            }
            EngineCommand::Shutdown { reply } => {
                // Handled by the run loop; reply so the caller is not left waiting
                let _ = reply.send(());
                SchedulerOutcome::Idle
            }
        };
        self.apply(outcome);
    }

    /// Translate a scheduler outcome into timer changes
    fn apply(&mut self, outcome: SchedulerOutcome) {
        match outcome {
            SchedulerOutcome::CrossfadeStarted { step_interval } => {
                let mut steps = interval_at(Instant::now() + step_interval, step_interval);
                steps.set_missed_tick_behavior(MissedTickBehavior::Burst);
                self.crossfade = Some(steps);
            }
            SchedulerOutcome::Advanced { .. } => self.schedule_preload(),
            SchedulerOutcome::Started { .. }
            | SchedulerOutcome::PreloadNeeded
            | SchedulerOutcome::CrossfadeAbandoned => self.preload_now(),
            SchedulerOutcome::PlaylistFinished => {
                self.settle = None;
            }
            SchedulerOutcome::Idle | SchedulerOutcome::CrossfadeStepped { .. } => {}
        }
    }

    fn schedule_preload(&mut self) {
        let delay = self.ctx.settings.preload_settle_ms;
        if delay == 0 {
            self.preload_now();
        } else {
            self.settle = Some(Box::pin(sleep(Duration::from_millis(delay))));
        }
    }

    fn preload_now(&mut self) {
        self.settle = None;
        let outcome = self.scheduler.preload(&mut self.ctx);
        trace!("Preload: {:?}", outcome);
    }

    /// Create or drop timers to match the current state
    fn sync_timers(&mut self) {
        if !self.scheduler.is_crossfading() {
            self.crossfade = None;
        }

        let want_poll = self.ctx.state.is_playing
            && self.ctx.settings.crossfades_enabled()
            && self.ctx.cursor.current().is_some();
        match (want_poll, self.poll.is_some()) {
            (true, false) => {
                let period = Duration::from_millis(self.ctx.settings.poll_interval_ms);
                let mut poll = interval_at(Instant::now() + period, period);
                poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
                self.poll = Some(poll);
            }
            (false, true) => self.poll = None,
            _ => {}
        }
    }

    fn publish(&mut self) {
        self.ctx.refresh();
        self.state_tx.send_replace(self.ctx.state.clone());
    }

    fn teardown(&mut self) {
        self.scheduler.stop(&mut self.ctx);
        self.ctx.inactive_slot_mut().pause();
        self.poll = None;
        self.crossfade = None;
        self.settle = None;
        self.ctx.unsubscribe_slots();
        self.publish();
    }
}

/// Next tick of an optional interval; pending forever when absent
async fn next_tick(interval: &mut Option<Interval>) -> Instant {
    match interval {
        Some(interval) => interval.tick().await,
        None => pending().await,
    }
}

/// Completes when the optional sleep elapses; pending forever when absent
async fn settle(sleep: &mut Option<Pin<Box<Sleep>>>) {
    match sleep {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}
