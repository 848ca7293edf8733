//! Shared playback context
//!
//! Everything the scheduler, crossfade engine and preload coordinator
//! operate on, passed explicitly instead of living in globals.

use crate::cursor::PlaylistCursor;
use crate::slot::{PlaybackSlot, SlotId, SlotNotice};
use chrono::Utc;
use serde::Serialize;
use tokio::sync::mpsc;
use ytdj_common::events::{EventBus, PlaybackState, TransitionEvent};
use ytdj_common::TransitionSettings;

/// Snapshot of the transition state exposed to the UI layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionState {
    /// Slot currently audible (or, when paused, the one that will resume)
    pub active_slot: SlotId,
    pub is_crossfading: bool,
    /// 0.0 to 1.0; 0 when not crossfading
    pub crossfade_progress: f64,
    /// Inactive slot holds the next entry, cued and silent
    pub next_track_preloaded: bool,
    pub volume_a: u8,
    pub volume_b: u8,
    pub is_playing: bool,
    pub current_index: Option<usize>,
}

impl Default for TransitionState {
    fn default() -> Self {
        Self {
            active_slot: SlotId::A,
            is_crossfading: false,
            crossfade_progress: 0.0,
            next_track_preloaded: false,
            volume_a: 0,
            volume_b: 0,
            is_playing: false,
            current_index: None,
        }
    }
}

#[derive(Debug)]
pub struct PlaybackContext {
    pub cursor: PlaylistCursor,
    pub settings: TransitionSettings,
    pub state: TransitionState,
    /// Target volume for the audible slot (0-100)
    pub master_volume: u8,
    pub events: EventBus,
    playback: PlaybackState,
    slot_a: PlaybackSlot,
    slot_b: PlaybackSlot,
}

impl PlaybackContext {
    pub fn new(
        cursor: PlaylistCursor,
        settings: TransitionSettings,
        master_volume: u8,
        events: EventBus,
        slot_a: PlaybackSlot,
        slot_b: PlaybackSlot,
    ) -> Self {
        Self {
            cursor,
            settings: settings.normalized(),
            state: TransitionState::default(),
            master_volume: master_volume.min(100),
            events,
            playback: PlaybackState::Stopped,
            slot_a,
            slot_b,
        }
    }

    pub fn slot(&self, id: SlotId) -> &PlaybackSlot {
        match id {
            SlotId::A => &self.slot_a,
            SlotId::B => &self.slot_b,
        }
    }

    pub fn slot_mut(&mut self, id: SlotId) -> &mut PlaybackSlot {
        match id {
            SlotId::A => &mut self.slot_a,
            SlotId::B => &mut self.slot_b,
        }
    }

    pub fn active_id(&self) -> SlotId {
        self.state.active_slot
    }

    pub fn inactive_id(&self) -> SlotId {
        self.state.active_slot.other()
    }

    pub fn active_slot(&self) -> &PlaybackSlot {
        self.slot(self.active_id())
    }

    pub fn active_slot_mut(&mut self) -> &mut PlaybackSlot {
        self.slot_mut(self.active_id())
    }

    pub fn inactive_slot_mut(&mut self) -> &mut PlaybackSlot {
        self.slot_mut(self.inactive_id())
    }

    /// Subscribe both slots to the engine's event channel
    pub fn subscribe_slots(&mut self, tx: &mpsc::UnboundedSender<SlotNotice>) {
        self.slot_a.subscribe(tx.clone());
        self.slot_b.subscribe(tx.clone());
    }

    pub fn unsubscribe_slots(&mut self) {
        self.slot_a.unsubscribe();
        self.slot_b.unsubscribe();
    }

    /// Copy slot volumes and the cursor index into the state snapshot
    pub fn refresh(&mut self) {
        self.state.volume_a = self.slot_a.volume();
        self.state.volume_b = self.slot_b.volume();
        self.state.current_index = self.cursor.index();
    }

    pub fn playback(&self) -> PlaybackState {
        self.playback
    }

    /// Record a playback state change, keeping `is_playing` in step
    pub fn set_playback(&mut self, new_state: PlaybackState) {
        let old_state = self.playback;
        self.playback = new_state;
        self.state.is_playing = new_state == PlaybackState::Playing;
        if old_state != new_state {
            self.emit(TransitionEvent::PlaybackStateChanged {
                old_state,
                new_state,
                timestamp: Utc::now(),
            });
        }
    }

    pub fn emit(&self, event: TransitionEvent) {
        self.events.emit_lossy(event);
    }
}
