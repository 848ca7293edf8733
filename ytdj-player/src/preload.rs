//! Preload coordination
//!
//! Cues the next playlist entry in the inactive slot, paused and silent,
//! so a crossfade can start without buffering. Never touches the active
//! slot.

use crate::context::PlaybackContext;
use crate::slot::SlotId;
use chrono::Utc;
use tracing::{debug, info};
use ytdj_common::events::TransitionEvent;
use ytdj_common::EntryId;

/// What a preload request did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadOutcome {
    Loaded { entry_id: EntryId, slot: SlotId },
    /// Inactive slot already holds the next entry
    AlreadyPreloaded,
    /// Slots are mid-crossfade; both are in use
    Crossfading,
    /// Current entry is the last playable one
    NothingNext,
    /// No entry is active yet
    NotStarted,
}

#[derive(Debug, Default)]
pub struct PreloadCoordinator {
    load_calls: usize,
}

impl PreloadCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the next entry into the inactive slot
    ///
    /// Idempotent: returns [`PreloadOutcome::AlreadyPreloaded`] without
    /// issuing a load while `next_track_preloaded` is set.
    pub fn preload(&mut self, ctx: &mut PlaybackContext) -> PreloadOutcome {
        if ctx.state.is_crossfading {
            return PreloadOutcome::Crossfading;
        }
        if ctx.cursor.current().is_none() {
            return PreloadOutcome::NotStarted;
        }
        if ctx.state.next_track_preloaded {
            return PreloadOutcome::AlreadyPreloaded;
        }
        let Some(next) = ctx.cursor.peek_next().cloned() else {
            debug!("Preload: no next entry");
            return PreloadOutcome::NothingNext;
        };

        let slot_id = ctx.inactive_id();
        let slot = ctx.slot_mut(slot_id);
        slot.pause();
        slot.set_volume(0);
        slot.load(&next);
        self.load_calls += 1;

        ctx.state.next_track_preloaded = true;
        info!(
            "Preloaded '{}' ({}) into slot {}",
            next.track.title, next.track.media_id, slot_id
        );
        ctx.emit(TransitionEvent::TrackPreloaded {
            entry_id: next.id,
            slot: slot_id,
            timestamp: Utc::now(),
        });

        PreloadOutcome::Loaded {
            entry_id: next.id,
            slot: slot_id,
        }
    }

    /// Forget the preloaded entry if it is no longer next
    ///
    /// Called after playlist edits. Returns true when the flag was cleared.
    pub fn invalidate(&mut self, ctx: &mut PlaybackContext) -> bool {
        if !ctx.state.next_track_preloaded || ctx.state.is_crossfading {
            return false;
        }
        let preloaded = ctx.slot(ctx.inactive_id()).entry();
        let next = ctx.cursor.peek_next().map(|e| e.id);
        if preloaded == next {
            return false;
        }

        debug!(
            "Preloaded entry {:?} is no longer next ({:?})",
            preloaded, next
        );
        ctx.state.next_track_preloaded = false;
        true
    }

    /// Number of loads issued so far
    pub fn load_calls(&self) -> usize {
        self.load_calls
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::PlaylistCursor;
    use crate::sim::{SimProbe, SimulatedPlayer};
    use crate::slot::PlaybackSlot;
    use std::collections::HashMap;
    use tokio::sync::mpsc;
    use ytdj_common::events::EventBus;
    use ytdj_common::model::entries_from_tracks;
    use ytdj_common::{Track, TransitionSettings};

    fn context(n: usize) -> (PlaybackContext, SimProbe, SimProbe) {
        let tracks: Vec<Track> = (0..n)
            .map(|i| Track::new(format!("m{}", i), format!("T{}", i), "X", 120.0))
            .collect();
        let catalog: HashMap<String, f64> =
            tracks.iter().map(|t| (t.media_id.clone(), t.duration_secs)).collect();
        let a = SimulatedPlayer::new(catalog.clone());
        let b = SimulatedPlayer::new(catalog);
        let (probe_a, probe_b) = (a.probe(), b.probe());

        let mut ctx = PlaybackContext::new(
            PlaylistCursor::new(entries_from_tracks(tracks)),
            TransitionSettings::default(),
            80,
            EventBus::new(16),
            PlaybackSlot::new(SlotId::A, Box::new(a)),
            PlaybackSlot::new(SlotId::B, Box::new(b)),
        );
        let (tx, _rx) = mpsc::unbounded_channel();
        ctx.subscribe_slots(&tx);
        ctx.slot_mut(SlotId::A).mark_ready();
        ctx.slot_mut(SlotId::B).mark_ready();
        (ctx, probe_a, probe_b)
    }

    #[test]
    fn test_preload_loads_inactive_slot_silently() {
        let (mut ctx, probe_a, probe_b) = context(3);
        ctx.cursor.jump_to(0);
        probe_a.clear_calls();

        let mut coordinator = PreloadCoordinator::new();
        let outcome = coordinator.preload(&mut ctx);

        let next_id = ctx.cursor.entry(1).unwrap().id;
        assert_eq!(
            outcome,
            PreloadOutcome::Loaded {
                entry_id: next_id,
                slot: SlotId::B
            }
        );
        assert!(ctx.state.next_track_preloaded);
        assert_eq!(probe_b.media_id().as_deref(), Some("m1"));
        assert_eq!(probe_b.volume(), 0);
        assert!(!probe_b.is_playing());
        assert!(probe_a.calls().is_empty());
    }

    #[test]
    fn test_preload_is_idempotent() {
        let (mut ctx, _probe_a, probe_b) = context(3);
        ctx.cursor.jump_to(0);

        let mut coordinator = PreloadCoordinator::new();
        coordinator.preload(&mut ctx);
        let outcome = coordinator.preload(&mut ctx);

        assert_eq!(outcome, PreloadOutcome::AlreadyPreloaded);
        assert_eq!(coordinator.load_calls(), 1);
        assert_eq!(probe_b.load_count(), 1);
    }

    #[test]
    fn test_preload_noops() {
        let (mut ctx, _probe_a, _probe_b) = context(2);
        let mut coordinator = PreloadCoordinator::new();
        assert_eq!(coordinator.preload(&mut ctx), PreloadOutcome::NotStarted);

        ctx.cursor.jump_to(1);
        assert_eq!(coordinator.preload(&mut ctx), PreloadOutcome::NothingNext);

        ctx.cursor.jump_to(0);
        ctx.state.is_crossfading = true;
        assert_eq!(coordinator.preload(&mut ctx), PreloadOutcome::Crossfading);
        assert_eq!(coordinator.load_calls(), 0);
    }

    #[test]
    fn test_invalidate_after_reorder() {
        let (mut ctx, _probe_a, _probe_b) = context(3);
        ctx.cursor.jump_to(0);
        let mut coordinator = PreloadCoordinator::new();
        coordinator.preload(&mut ctx);

        // Same next entry: nothing to do
        assert!(!coordinator.invalidate(&mut ctx));

        let mut edited = ctx.cursor.entries().to_vec();
        edited.swap(1, 2);
        ctx.cursor.replace(edited).unwrap();
        assert!(coordinator.invalidate(&mut ctx));
        assert!(!ctx.state.next_track_preloaded);

        coordinator.preload(&mut ctx);
        assert_eq!(coordinator.load_calls(), 2);
    }
}
