//! Transition scheduler
//!
//! Decides when the active track hands over to the next one and performs the
//! hand-over. Timing inputs (position polls, crossfade steps) and slot events
//! arrive from the driver in [`crate::engine`]; each is mapped through the
//! transition table in [`decide`] before anything touches the slots.
//!
//! **Trigger point:** `duration - mix_out`, where `mix_out` is the track's
//! hint or `min(30, 0.15 × duration)`.
//!
//! **Role swap:** slots are never reloaded to hand over. The incoming slot
//! becomes active and the outgoing slot is parked, paused and rewound, ready
//! to receive the following preload.

use crate::context::PlaybackContext;
use crate::crossfade::{CrossfadeEngine, CrossfadeRun, CrossfadeStep};
use crate::error::{Error, Result};
use crate::preload::{PreloadCoordinator, PreloadOutcome};
use crate::slot::SlotId;
use chrono::Utc;
use std::time::Duration;
use tracing::{debug, info, warn};
use ytdj_common::events::{AdvanceKind, PlaybackState, TransitionEvent};
use ytdj_common::settings::clamp_crossfade_secs;
use ytdj_common::{EntryId, PlaylistEntry, Track, TransitionHint, TransitionSettings};

/// Upper bound of the default mix-out lead, in seconds
pub const MAX_DEFAULT_MIX_OUT_SECS: f64 = 30.0;

/// Fraction of the track used as the default mix-out lead
pub const DEFAULT_MIX_OUT_FRACTION: f64 = 0.15;

/// Seconds before the end of a track at which its crossfade begins
///
/// A hint that is not finite, negative, or longer than the track is a
/// configuration error: it is logged and replaced by the default rule.
pub fn mix_out_point(duration_secs: f64, hint: Option<&TransitionHint>) -> f64 {
    let default = (DEFAULT_MIX_OUT_FRACTION * duration_secs).min(MAX_DEFAULT_MIX_OUT_SECS);
    match hint.and_then(|h| h.mix_out_point_secs) {
        Some(secs) if secs.is_finite() && secs >= 0.0 && secs <= duration_secs => secs,
        Some(secs) => {
            warn!(
                "Mix-out hint {}s invalid for {:.1}s track, using {:.1}s",
                secs, duration_secs, default
            );
            default
        }
        None => default,
    }
}

/// Playback position at which the crossfade out of a track starts
pub fn trigger_position(duration_secs: f64, hint: Option<&TransitionHint>) -> f64 {
    (duration_secs - mix_out_point(duration_secs, hint)).max(0.0)
}

/// Crossfade length for the transition out of `track`, clamped to 5-30 s
pub fn crossfade_secs(track: &Track, settings: &TransitionSettings) -> f64 {
    let requested = track
        .transition_hint
        .and_then(|h| h.crossfade_secs)
        .filter(|secs| secs.is_finite())
        .unwrap_or(settings.default_crossfade_secs);
    clamp_crossfade_secs(requested)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Crossfading,
}

/// Inputs to the transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerInput {
    PositionPolled {
        reached_trigger: bool,
        has_next: bool,
        crossfades_enabled: bool,
    },
    StepElapsed,
    /// Audible slot reported its natural end
    ActiveEnded {
        has_next: bool,
        crossfades_enabled: bool,
    },
    Paused,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    BeginCrossfade,
    StepCrossfade,
    FinishCrossfadeNow,
    AbandonCrossfade,
    /// Natural end without a crossfade: hard cut to the next entry
    FallbackAdvance,
    /// Crossfades disabled: start the next entry after the end
    GappedAdvance,
    FinishPlaylist,
}

/// Transition table
pub fn decide(phase: Phase, input: SchedulerInput) -> Action {
    use SchedulerInput::*;

    match (phase, input) {
        (
            Phase::Idle,
            PositionPolled {
                reached_trigger: true,
                has_next: true,
                crossfades_enabled: true,
            },
        ) => Action::BeginCrossfade,
        // Guard: polls during a fade never start a second one
        (_, PositionPolled { .. }) => Action::None,

        (Phase::Crossfading, StepElapsed) => Action::StepCrossfade,
        (Phase::Idle, StepElapsed) => Action::None,

        (Phase::Crossfading, ActiveEnded { .. }) => Action::FinishCrossfadeNow,
        (Phase::Idle, ActiveEnded { has_next: false, .. }) => Action::FinishPlaylist,
        (
            Phase::Idle,
            ActiveEnded {
                crossfades_enabled: true,
                ..
            },
        ) => Action::FallbackAdvance,
        (Phase::Idle, ActiveEnded { .. }) => Action::GappedAdvance,

        (Phase::Crossfading, Paused) => Action::FinishCrossfadeNow,
        (Phase::Idle, Paused) => Action::None,

        (Phase::Crossfading, Stopped) => Action::AbandonCrossfade,
        (Phase::Idle, Stopped) => Action::None,
    }
}

/// Manual navigation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipDirection {
    Next,
    Previous,
}

/// What the driver has to do after a scheduler call
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SchedulerOutcome {
    Idle,
    /// Arm the step timer at `step_interval`
    CrossfadeStarted { step_interval: Duration },
    CrossfadeStepped { progress: f64 },
    /// Cursor moved; preload after the settle delay
    Advanced { kind: AdvanceKind, index: usize },
    /// Playback (re)started; preload now
    Started { index: usize },
    CrossfadeAbandoned,
    /// Inactive slot no longer holds the next entry; preload now
    PreloadNeeded,
    PlaylistFinished,
}

#[derive(Debug)]
pub struct TransitionScheduler {
    phase: Phase,
    engine: CrossfadeEngine,
    preloader: PreloadCoordinator,
}

impl Default for TransitionScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TransitionScheduler {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            engine: CrossfadeEngine::new(),
            preloader: PreloadCoordinator::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_crossfading(&self) -> bool {
        self.phase == Phase::Crossfading
    }

    pub fn preloader(&self) -> &PreloadCoordinator {
        &self.preloader
    }

    /// Preload the next entry into the inactive slot
    pub fn preload(&mut self, ctx: &mut PlaybackContext) -> PreloadOutcome {
        self.preloader.preload(ctx)
    }

    /// Position poll: start a crossfade once the trigger point is reached
    pub fn poll(&mut self, ctx: &mut PlaybackContext) -> SchedulerOutcome {
        if !ctx.state.is_playing {
            return SchedulerOutcome::Idle;
        }
        let Some(current) = ctx.cursor.current() else {
            return SchedulerOutcome::Idle;
        };
        let active = ctx.active_slot();
        let Some(position) = active.current_time() else {
            return SchedulerOutcome::Idle;
        };
        let duration = active.duration().unwrap_or(current.track.duration_secs);
        let trigger = trigger_position(duration, current.track.transition_hint.as_ref());

        let input = SchedulerInput::PositionPolled {
            reached_trigger: position >= trigger,
            has_next: ctx.cursor.peek_next().is_some(),
            crossfades_enabled: ctx.settings.crossfades_enabled(),
        };
        match decide(self.phase, input) {
            Action::BeginCrossfade => {
                debug!(
                    "Position {:.2}s reached trigger {:.2}s of {:.1}s",
                    position, trigger, duration
                );
                self.begin_crossfade(ctx)
            }
            _ => SchedulerOutcome::Idle,
        }
    }

    fn begin_crossfade(&mut self, ctx: &mut PlaybackContext) -> SchedulerOutcome {
        let (Some(current), Some(next)) = (
            ctx.cursor.current().cloned(),
            ctx.cursor.peek_next().cloned(),
        ) else {
            return SchedulerOutcome::Idle;
        };

        // Inactive slot must hold the next entry before it can fade in
        self.preloader.invalidate(ctx);
        self.preloader.preload(ctx);

        let duration_secs = crossfade_secs(&current.track, &ctx.settings);
        let run = CrossfadeRun::new(
            ctx.active_id(),
            ctx.inactive_id(),
            current.id,
            next.id,
            duration_secs,
            next.track.start_offset(),
            ctx.settings.crossfade_steps,
            ctx.settings.fade_curve,
        );
        let step_interval = self.engine.begin(ctx, run);
        self.phase = Phase::Crossfading;
        SchedulerOutcome::CrossfadeStarted { step_interval }
    }

    /// Crossfade step timer elapsed
    pub fn step_crossfade(&mut self, ctx: &mut PlaybackContext) -> SchedulerOutcome {
        if decide(self.phase, SchedulerInput::StepElapsed) != Action::StepCrossfade {
            return SchedulerOutcome::Idle;
        }
        match self.engine.step(ctx) {
            Some(CrossfadeStep::InProgress { progress }) => {
                SchedulerOutcome::CrossfadeStepped { progress }
            }
            Some(CrossfadeStep::Completed(run)) => self.complete_crossfade(ctx, run),
            None => {
                self.phase = Phase::Idle;
                SchedulerOutcome::Idle
            }
        }
    }

    fn finish_crossfade(&mut self, ctx: &mut PlaybackContext) -> SchedulerOutcome {
        match self.engine.finish_now(ctx) {
            Some(run) => self.complete_crossfade(ctx, run),
            None => {
                self.phase = Phase::Idle;
                SchedulerOutcome::Idle
            }
        }
    }

    fn abandon_crossfade(&mut self, ctx: &mut PlaybackContext) -> bool {
        self.phase = Phase::Idle;
        self.engine.abandon(ctx).is_some()
    }

    /// Role swap after the last step
    fn complete_crossfade(
        &mut self,
        ctx: &mut PlaybackContext,
        run: CrossfadeRun,
    ) -> SchedulerOutcome {
        self.swap_roles(ctx, &run);
        match ctx.cursor.position_of(run.to_entry) {
            Some(index) => self.advance_to(ctx, index, AdvanceKind::Crossfade),
            None => {
                warn!("Crossfaded entry {} no longer in playlist", run.to_entry);
                ctx.state.next_track_preloaded = false;
                SchedulerOutcome::PreloadNeeded
            }
        }
    }

    /// Make the incoming slot active; the cursor is left alone
    fn swap_roles(&mut self, ctx: &mut PlaybackContext, run: &CrossfadeRun) {
        self.phase = Phase::Idle;
        ctx.state.active_slot = run.incoming;

        info!("Crossfade complete, slot {} now active", run.incoming);
        ctx.emit(TransitionEvent::CrossfadeCompleted {
            from_entry: run.from_entry,
            to_entry: run.to_entry,
            active_slot: run.incoming,
            timestamp: Utc::now(),
        });
    }

    /// Move the cursor and publish the new active entry
    ///
    /// Clears `next_track_preloaded`: the inactive slot now holds the entry
    /// that just stopped playing.
    fn advance_to(
        &mut self,
        ctx: &mut PlaybackContext,
        index: usize,
        kind: AdvanceKind,
    ) -> SchedulerOutcome {
        ctx.cursor.jump_to(index);
        ctx.state.next_track_preloaded = false;
        ctx.refresh();

        let Some(entry) = ctx.cursor.current() else {
            return SchedulerOutcome::Idle;
        };
        let entry_id = entry.id;
        info!(
            "Now playing [{}] '{}' by {} in slot {} ({:?})",
            index,
            entry.track.title,
            entry.track.artist,
            ctx.active_id(),
            kind
        );
        ctx.emit(TransitionEvent::ActiveIndexChanged {
            index,
            entry_id,
            kind,
            timestamp: Utc::now(),
        });
        ctx.emit(TransitionEvent::TrackStarted {
            entry_id,
            index,
            slot: ctx.active_id(),
            timestamp: Utc::now(),
        });
        SchedulerOutcome::Advanced { kind, index }
    }

    /// Hard cut into the inactive slot
    ///
    /// Uses the preloaded media when the inactive slot already holds the
    /// target entry, otherwise loads it there first.
    fn cut_to(
        &mut self,
        ctx: &mut PlaybackContext,
        index: usize,
        kind: AdvanceKind,
    ) -> SchedulerOutcome {
        let Some(entry) = ctx.cursor.entry(index).cloned() else {
            return SchedulerOutcome::Idle;
        };
        let target = ctx.inactive_id();
        let preloaded = ctx.state.next_track_preloaded && ctx.slot(target).entry() == Some(entry.id);
        let master_volume = ctx.master_volume;
        let playing = ctx.state.is_playing;

        let outgoing = ctx.active_slot_mut();
        outgoing.pause();
        outgoing.seek(0.0);
        outgoing.set_volume(0);

        let slot = ctx.slot_mut(target);
        if preloaded {
            slot.seek(entry.track.start_offset());
        } else {
            slot.load(&entry);
        }
        slot.set_volume(master_volume);
        if playing {
            slot.play();
        }
        ctx.state.active_slot = target;
        self.advance_to(ctx, index, kind)
    }

    /// Load an entry straight into the active slot (first start)
    fn load_active(&mut self, ctx: &mut PlaybackContext, index: usize) -> SchedulerOutcome {
        let Some(entry) = ctx.cursor.entry(index).cloned() else {
            return SchedulerOutcome::Idle;
        };
        let master_volume = ctx.master_volume;
        let playing = ctx.state.is_playing;
        let slot = ctx.active_slot_mut();
        slot.load(&entry);
        slot.set_volume(master_volume);
        if playing {
            slot.play();
        }
        self.advance_to(ctx, index, AdvanceKind::Manual)
    }

    fn finish_playlist(&mut self, ctx: &mut PlaybackContext, last_entry: EntryId) -> SchedulerOutcome {
        info!("Reached end of playlist with no next entry");
        ctx.emit(TransitionEvent::FallbackAdvance {
            from_entry: last_entry,
            to_entry: None,
            timestamp: Utc::now(),
        });
        ctx.emit(TransitionEvent::PlaylistFinished {
            last_entry: Some(last_entry),
            timestamp: Utc::now(),
        });
        ctx.set_playback(PlaybackState::Stopped);
        SchedulerOutcome::PlaylistFinished
    }

    /// A slot reported its natural end
    pub fn on_ended(&mut self, ctx: &mut PlaybackContext, slot: SlotId) -> SchedulerOutcome {
        if let Some(run) = self.engine.run() {
            if slot == run.incoming {
                // Incoming track shorter than the fade
                debug!("Incoming slot {} ended mid-crossfade", slot);
                // Its preload is moot: the now-active slot has ended too
                let _swapped = self.finish_crossfade(ctx);
                return self.on_ended(ctx, slot);
            }
        }
        if slot != ctx.active_id() {
            debug!("Ignoring end of inactive slot {}", slot);
            return SchedulerOutcome::Idle;
        }
        let Some(current) = ctx.cursor.current().map(|e| e.id) else {
            return SchedulerOutcome::Idle;
        };
        let next = ctx.cursor.peek_next_index();

        let input = SchedulerInput::ActiveEnded {
            has_next: next.is_some(),
            crossfades_enabled: ctx.settings.crossfades_enabled(),
        };
        match (decide(self.phase, input), next) {
            (Action::FinishCrossfadeNow, _) => {
                debug!("Outgoing slot {} ended mid-crossfade", slot);
                self.finish_crossfade(ctx)
            }
            (Action::FinishPlaylist, _) => self.finish_playlist(ctx, current),
            (Action::FallbackAdvance, Some(index)) => {
                let to_entry = ctx.cursor.entry(index).map(|e| e.id);
                info!("Track ended before crossfade, cutting to next entry");
                ctx.emit(TransitionEvent::FallbackAdvance {
                    from_entry: current,
                    to_entry,
                    timestamp: Utc::now(),
                });
                self.cut_to(ctx, index, AdvanceKind::Fallback)
            }
            (Action::GappedAdvance, Some(index)) => self.cut_to(ctx, index, AdvanceKind::Gapped),
            _ => SchedulerOutcome::Idle,
        }
    }

    /// A slot reported a media error
    ///
    /// The entry is marked unplayable and skipped.
    pub fn on_load_failure(
        &mut self,
        ctx: &mut PlaybackContext,
        slot: SlotId,
        error_code: i32,
    ) -> SchedulerOutcome {
        let Some(entry_id) = ctx.slot(slot).entry() else {
            warn!("Slot {} reported error {} with nothing loaded", slot, error_code);
            return SchedulerOutcome::Idle;
        };
        warn!(
            "Slot {} failed to load entry {} (error {}), skipping",
            slot, entry_id, error_code
        );
        ctx.cursor.mark_unplayable(entry_id);
        ctx.emit(TransitionEvent::TrackSkipped {
            entry_id,
            error_code,
            timestamp: Utc::now(),
        });

        if let Some(run) = self.engine.run() {
            if slot == run.incoming {
                self.abandon_crossfade(ctx);
                ctx.slot_mut(slot).clear_entry();
                ctx.state.next_track_preloaded = false;
                return SchedulerOutcome::PreloadNeeded;
            }
            return self.finish_crossfade(ctx);
        }

        ctx.slot_mut(slot).clear_entry();
        if slot != ctx.active_id() {
            ctx.state.next_track_preloaded = false;
            return SchedulerOutcome::PreloadNeeded;
        }

        match ctx.cursor.peek_next_index() {
            Some(index) => self.cut_to(ctx, index, AdvanceKind::Skipped),
            None => self.finish_playlist(ctx, entry_id),
        }
    }

    /// Widget finished initializing
    ///
    /// Re-issues play for the slot that should be audible, since calls made
    /// before ready were skipped.
    pub fn on_ready(&mut self, ctx: &mut PlaybackContext, slot: SlotId) {
        ctx.slot_mut(slot).mark_ready();
        let audible = slot == ctx.active_id()
            || self.engine.run().map(|r| r.incoming == slot).unwrap_or(false);
        if ctx.state.is_playing && audible && ctx.slot(slot).entry().is_some() {
            ctx.slot_mut(slot).play();
        }
    }

    /// Start or resume playback
    ///
    /// `None` resumes the current entry (or starts the first playable one);
    /// `Some(index)` jumps there.
    pub fn start(&mut self, ctx: &mut PlaybackContext, index: Option<usize>) -> SchedulerOutcome {
        let current = ctx.cursor.index();
        match (index, current) {
            (Some(i), Some(c)) if i != c => self.jump(ctx, i),
            (None, None) | (Some(_), None) => {
                let Some(first) = ctx.cursor.first_playable_from(index.unwrap_or(0)) else {
                    warn!("Nothing playable from index {}", index.unwrap_or(0));
                    return SchedulerOutcome::Idle;
                };
                ctx.set_playback(PlaybackState::Playing);
                match self.load_active(ctx, first) {
                    SchedulerOutcome::Advanced { index, .. } => SchedulerOutcome::Started { index },
                    other => other,
                }
            }
            (_, Some(c)) => {
                if ctx.playback() == PlaybackState::Playing {
                    return SchedulerOutcome::Idle;
                }
                let master_volume = ctx.master_volume;
                let slot = ctx.active_slot_mut();
                slot.set_volume(master_volume);
                slot.play();
                ctx.set_playback(PlaybackState::Playing);
                info!("Playback resumed at index {}", c);
                SchedulerOutcome::Started { index: c }
            }
        }
    }

    /// Cut to an arbitrary entry
    pub fn jump(&mut self, ctx: &mut PlaybackContext, index: usize) -> SchedulerOutcome {
        let Some(target) = ctx.cursor.first_playable_from(index) else {
            warn!("Cannot jump to index {}: nothing playable", index);
            return SchedulerOutcome::Idle;
        };
        if self.is_crossfading() {
            self.abandon_crossfade(ctx);
        }
        if ctx.cursor.index().is_none() {
            return self.start(ctx, Some(target));
        }
        ctx.set_playback(PlaybackState::Playing);
        self.cut_to(ctx, target, AdvanceKind::Manual)
    }

    /// Manual next/previous; abandons any crossfade first
    pub fn skip(&mut self, ctx: &mut PlaybackContext, direction: SkipDirection) -> SchedulerOutcome {
        let target = match direction {
            SkipDirection::Next => ctx.cursor.peek_next_index(),
            SkipDirection::Previous => ctx.cursor.peek_previous_index(),
        };
        let Some(index) = target else {
            debug!("Skip {:?}: no entry in that direction", direction);
            return SchedulerOutcome::Idle;
        };
        if self.is_crossfading() {
            self.abandon_crossfade(ctx);
        }
        self.cut_to(ctx, index, AdvanceKind::Manual)
    }

    /// Pause; a running crossfade completes immediately first
    pub fn pause(&mut self, ctx: &mut PlaybackContext) -> SchedulerOutcome {
        if ctx.playback() != PlaybackState::Playing {
            return SchedulerOutcome::Idle;
        }
        let outcome = match decide(self.phase, SchedulerInput::Paused) {
            Action::FinishCrossfadeNow => self.finish_crossfade(ctx),
            _ => SchedulerOutcome::Idle,
        };
        ctx.active_slot_mut().pause();
        ctx.set_playback(PlaybackState::Paused);
        info!("Playback paused");
        outcome
    }

    /// Stop playback and abandon any crossfade
    ///
    /// The active entry is re-cued at its start offset; the cursor stays.
    pub fn stop(&mut self, ctx: &mut PlaybackContext) -> SchedulerOutcome {
        let outcome = match decide(self.phase, SchedulerInput::Stopped) {
            Action::AbandonCrossfade if self.abandon_crossfade(ctx) => {
                SchedulerOutcome::CrossfadeAbandoned
            }
            _ => SchedulerOutcome::Idle,
        };
        let start = ctx
            .cursor
            .current()
            .map(|e| e.track.start_offset())
            .unwrap_or(0.0);
        let slot = ctx.active_slot_mut();
        slot.pause();
        slot.seek(start);
        ctx.set_playback(PlaybackState::Stopped);
        outcome
    }

    /// Apply a new master volume
    ///
    /// During a crossfade the next step picks it up.
    pub fn set_master_volume(&mut self, ctx: &mut PlaybackContext, volume: u8) {
        ctx.master_volume = volume.min(100);
        if !self.is_crossfading() {
            let volume = ctx.master_volume;
            ctx.active_slot_mut().set_volume(volume);
        }
        ctx.refresh();
    }

    /// Replace the playlist after an edit
    ///
    /// A running crossfade is completed first so both slots hold stable
    /// entries. Fails without side effects if the edit drops the entry that
    /// is (or is about to become) active.
    pub fn replace_playlist(
        &mut self,
        ctx: &mut PlaybackContext,
        entries: Vec<PlaylistEntry>,
    ) -> Result<SchedulerOutcome> {
        let active_entry = match self.engine.run() {
            Some(run) => Some(run.to_entry),
            None => ctx.cursor.current().map(|e| e.id),
        };
        if let Some(id) = active_entry {
            if !entries.iter().any(|e| e.id == id) {
                return Err(Error::Playlist(format!(
                    "active entry {} cannot be removed",
                    id
                )));
            }
        }

        // Finish a running fade without publishing the index yet: it is
        // only known once the edit is applied
        let finished = if self.is_crossfading() {
            self.phase = Phase::Idle;
            self.engine.finish_now(ctx)
        } else {
            None
        };
        if let Some(run) = &finished {
            self.swap_roles(ctx, run);
            if let Some(index) = ctx.cursor.position_of(run.to_entry) {
                ctx.cursor.jump_to(index);
            }
        }

        ctx.cursor.replace(entries)?;
        ctx.refresh();

        if let (Some(_), Some(index)) = (&finished, ctx.cursor.index()) {
            return Ok(self.advance_to(ctx, index, AdvanceKind::Crossfade));
        }
        self.preloader.invalidate(ctx);
        if !ctx.state.next_track_preloaded && ctx.cursor.current().is_some() {
            return Ok(SchedulerOutcome::PreloadNeeded);
        }
        Ok(SchedulerOutcome::Idle)
    }

    /// Apply new settings; a running crossfade keeps its parameters
    pub fn update_settings(&mut self, ctx: &mut PlaybackContext, settings: TransitionSettings) {
        ctx.settings = settings.normalized();
        debug!("Transition settings updated: {:?}", ctx.settings);
    }
}
