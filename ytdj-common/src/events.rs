//! Event types for the YTDJ playback core
//!
//! Provides the TransitionEvent enum and the EventBus used to report
//! transitions back to the UI layer and the playlist store.

use crate::model::{EntryId, SlotId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Playback state enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    Paused,
    Stopped,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
            PlaybackState::Stopped => write!(f, "stopped"),
        }
    }
}

/// How the cursor moved from one entry to another
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AdvanceKind {
    /// Completed crossfade at the mix-out point
    Crossfade,
    /// Natural end reached without a crossfade having triggered
    Fallback,
    /// Gapped mode: next track started after the previous one ended
    Gapped,
    /// Active track failed to load and was skipped
    Skipped,
    /// User navigation (next/previous/jump)
    Manual,
}

/// Playback core events
///
/// Events are broadcast via EventBus and serialize with a `type` tag so the
/// UI layer can forward them unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TransitionEvent {
    /// Playback state changed (Playing / Paused / Stopped)
    PlaybackStateChanged {
        old_state: PlaybackState,
        new_state: PlaybackState,
        timestamp: DateTime<Utc>,
    },

    /// An entry became the audible track
    TrackStarted {
        entry_id: EntryId,
        index: usize,
        slot: SlotId,
        timestamp: DateTime<Utc>,
    },

    /// Next entry cued paused and silent in the inactive slot
    TrackPreloaded {
        entry_id: EntryId,
        slot: SlotId,
        timestamp: DateTime<Utc>,
    },

    CrossfadeStarted {
        from_entry: EntryId,
        to_entry: EntryId,
        outgoing: SlotId,
        incoming: SlotId,
        /// Crossfade length in seconds
        duration_secs: f64,
        timestamp: DateTime<Utc>,
    },

    CrossfadeCompleted {
        from_entry: EntryId,
        to_entry: EntryId,
        active_slot: SlotId,
        timestamp: DateTime<Utc>,
    },

    /// A crossfade stopped before its last step
    CrossfadeAbandoned {
        from_entry: EntryId,
        to_entry: EntryId,
        /// Progress reached when abandoned (0.0 to 1.0)
        progress: f64,
        timestamp: DateTime<Utc>,
    },

    /// Track reached its natural end without a crossfade having triggered
    FallbackAdvance {
        from_entry: EntryId,
        to_entry: Option<EntryId>,
        timestamp: DateTime<Utc>,
    },

    /// Entry failed to load and will be skipped
    TrackSkipped {
        entry_id: EntryId,
        error_code: i32,
        timestamp: DateTime<Utc>,
    },

    /// Active index write-back for the playlist store
    ActiveIndexChanged {
        index: usize,
        entry_id: EntryId,
        kind: AdvanceKind,
        timestamp: DateTime<Utc>,
    },

    /// Last entry finished; nothing left to play
    PlaylistFinished {
        last_entry: Option<EntryId>,
        timestamp: DateTime<Utc>,
    },
}

/// Central event distribution bus
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block the engine)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TransitionEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<TransitionEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: TransitionEvent,
    ) -> Result<usize, broadcast::error::SendError<TransitionEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: TransitionEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = TransitionEvent::ActiveIndexChanged {
            index: 2,
            entry_id: Uuid::nil(),
            kind: AdvanceKind::Crossfade,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ActiveIndexChanged");
        assert_eq!(json["index"], 2);
        assert_eq!(json["kind"], "crossfade");
    }

    #[test]
    fn test_emit_without_subscribers_fails() {
        let bus = EventBus::new(8);
        let result = bus.emit(TransitionEvent::PlaylistFinished {
            last_entry: None,
            timestamp: Utc::now(),
        });
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit_lossy(TransitionEvent::PlaybackStateChanged {
            old_state: PlaybackState::Stopped,
            new_state: PlaybackState::Playing,
            timestamp: Utc::now(),
        });

        match rx.recv().await.unwrap() {
            TransitionEvent::PlaybackStateChanged { new_state, .. } => {
                assert_eq!(new_state, PlaybackState::Playing);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
