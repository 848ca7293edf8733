//! Crossfade engine
//!
//! Drives the volumes of the outgoing and incoming slots across a fixed
//! number of steps. The engine owns only the fade itself: it never moves
//! the playlist cursor or swaps slot roles. The scheduler does that once a
//! run reports [`CrossfadeStep::Completed`].
//!
//! Step timing is external. The driver calls [`CrossfadeEngine::step`] every
//! [`CrossfadeRun::step_interval`].

use crate::context::PlaybackContext;
use crate::slot::SlotId;
use chrono::Utc;
use std::time::Duration;
use tracing::{debug, info};
use ytdj_common::events::TransitionEvent;
use ytdj_common::{EntryId, FadeCurve};

/// Slot volumes `(outgoing, incoming)` at progress `p` for target volume `v`
///
/// Each gain is rounded to the nearest integer volume.
pub fn crossfade_volumes(curve: FadeCurve, progress: f64, target: u8) -> (u8, u8) {
    let (out_gain, in_gain) = curve.gains(progress);
    let scale = |gain: f64| (gain * target as f64).round().clamp(0.0, 100.0) as u8;
    (scale(out_gain), scale(in_gain))
}

/// Equal-power volumes: `out = round(cos(p·π/2)·V)`, `in = round(sin(p·π/2)·V)`
pub fn equal_power_volumes(progress: f64, target: u8) -> (u8, u8) {
    crossfade_volumes(FadeCurve::EqualPower, progress, target)
}

/// One crossfade between two entries
#[derive(Debug, Clone, PartialEq)]
pub struct CrossfadeRun {
    pub outgoing: SlotId,
    pub incoming: SlotId,
    pub from_entry: EntryId,
    pub to_entry: EntryId,
    /// Crossfade length in seconds
    pub duration_secs: f64,
    /// Cue point of the incoming entry
    pub incoming_start_secs: f64,
    pub steps: u32,
    /// Steps applied so far (0..=steps)
    pub step: u32,
    pub curve: FadeCurve,
}

impl CrossfadeRun {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        outgoing: SlotId,
        incoming: SlotId,
        from_entry: EntryId,
        to_entry: EntryId,
        duration_secs: f64,
        incoming_start_secs: f64,
        steps: u32,
        curve: FadeCurve,
    ) -> Self {
        Self {
            outgoing,
            incoming,
            from_entry,
            to_entry,
            duration_secs,
            incoming_start_secs,
            steps: steps.max(1),
            step: 0,
            curve,
        }
    }

    /// Fraction of steps applied (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        self.step as f64 / self.steps as f64
    }

    /// Time between volume updates: `duration / steps`
    pub fn step_interval(&self) -> Duration {
        Duration::from_secs_f64(self.duration_secs.max(0.0) / self.steps as f64)
    }

    pub fn is_complete(&self) -> bool {
        self.step >= self.steps
    }
}

/// Result of a single step
#[derive(Debug, Clone, PartialEq)]
pub enum CrossfadeStep {
    InProgress { progress: f64 },
    /// Last step applied; outgoing slot paused and rewound
    Completed(CrossfadeRun),
}

#[derive(Debug, Default)]
pub struct CrossfadeEngine {
    run: Option<CrossfadeRun>,
}

impl CrossfadeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    pub fn run(&self) -> Option<&CrossfadeRun> {
        self.run.as_ref()
    }

    pub fn progress(&self) -> f64 {
        self.run.as_ref().map(CrossfadeRun::progress).unwrap_or(0.0)
    }

    /// Start the incoming slot silently and arm the run
    ///
    /// Returns the step interval the driver should tick at.
    pub fn begin(&mut self, ctx: &mut PlaybackContext, run: CrossfadeRun) -> Duration {
        let incoming = ctx.slot_mut(run.incoming);
        incoming.seek(run.incoming_start_secs);
        incoming.set_volume(0);
        incoming.play();

        ctx.state.is_crossfading = true;
        ctx.state.crossfade_progress = 0.0;

        info!(
            "Crossfade {} -> {} started ({:.1}s, {} steps)",
            run.outgoing, run.incoming, run.duration_secs, run.steps
        );
        ctx.emit(TransitionEvent::CrossfadeStarted {
            from_entry: run.from_entry,
            to_entry: run.to_entry,
            outgoing: run.outgoing,
            incoming: run.incoming,
            duration_secs: run.duration_secs,
            timestamp: Utc::now(),
        });

        let interval = run.step_interval();
        self.run = Some(run);
        interval
    }

    /// Apply the next volume step
    ///
    /// Master volume is read on every step so volume changes during a fade
    /// take effect immediately. Returns `None` when no run is active.
    pub fn step(&mut self, ctx: &mut PlaybackContext) -> Option<CrossfadeStep> {
        let run = self.run.as_mut()?;
        run.step = (run.step + 1).min(run.steps);
        let progress = run.progress();
        let (out_volume, in_volume) = crossfade_volumes(run.curve, progress, ctx.master_volume);

        // A failed update leaves that slot's volume as it was
        ctx.slot_mut(run.outgoing).set_volume(out_volume);
        ctx.slot_mut(run.incoming).set_volume(in_volume);
        ctx.state.crossfade_progress = progress;

        debug!(
            "Crossfade step {}/{}: {}={} {}={}",
            run.step, run.steps, run.outgoing, out_volume, run.incoming, in_volume
        );

        if !run.is_complete() {
            return Some(CrossfadeStep::InProgress { progress });
        }

        let run = self.run.take()?;
        let master_volume = ctx.master_volume;
        let outgoing = ctx.slot_mut(run.outgoing);
        outgoing.pause();
        outgoing.seek(0.0);
        outgoing.set_volume(0);
        ctx.slot_mut(run.incoming).set_volume(master_volume);

        ctx.state.is_crossfading = false;
        ctx.state.crossfade_progress = 0.0;
        Some(CrossfadeStep::Completed(run))
    }

    /// Jump straight to the final step
    pub fn finish_now(&mut self, ctx: &mut PlaybackContext) -> Option<CrossfadeRun> {
        let run = self.run.as_mut()?;
        run.step = run.steps.saturating_sub(1);
        match self.step(ctx) {
            Some(CrossfadeStep::Completed(run)) => Some(run),
            _ => None,
        }
    }

    /// Stop the run without completing it
    ///
    /// The incoming slot is paused, re-cued and silenced, leaving it
    /// preloaded. The outgoing slot returns to the master volume.
    pub fn abandon(&mut self, ctx: &mut PlaybackContext) -> Option<CrossfadeRun> {
        let run = self.run.take()?;
        let progress = run.progress();
        let master_volume = ctx.master_volume;

        let incoming = ctx.slot_mut(run.incoming);
        incoming.pause();
        incoming.seek(run.incoming_start_secs);
        incoming.set_volume(0);
        ctx.slot_mut(run.outgoing).set_volume(master_volume);

        ctx.state.is_crossfading = false;
        ctx.state.crossfade_progress = 0.0;

        info!(
            "Crossfade {} -> {} abandoned at {:.0}%",
            run.outgoing,
            run.incoming,
            progress * 100.0
        );
        ctx.emit(TransitionEvent::CrossfadeAbandoned {
            from_entry: run.from_entry,
            to_entry: run.to_entry,
            progress,
            timestamp: Utc::now(),
        });
        Some(run)
    }
}
