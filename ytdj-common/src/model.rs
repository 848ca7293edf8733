//! Playlist data model
//!
//! Tracks and playlist entries as handed to the playback core by the
//! playlist/editor store. Field names serialize in camelCase to match the
//! store's JSON representation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Playlist entry identifier
pub type EntryId = Uuid;

/// Label of one of the two interchangeable playback slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotId {
    A,
    B,
}

impl SlotId {
    /// The opposite slot
    pub fn other(self) -> SlotId {
        match self {
            SlotId::A => SlotId::B,
            SlotId::B => SlotId::A,
        }
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotId::A => write!(f, "A"),
            SlotId::B => write!(f, "B"),
        }
    }
}

/// Per-track transition hints supplied by playlist generation
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionHint {
    /// Seconds before the track's end at which the crossfade should begin
    #[serde(default, rename = "mixOutPoint")]
    pub mix_out_point_secs: Option<f64>,

    /// Crossfade length in seconds
    #[serde(default, rename = "crossfadeDuration")]
    pub crossfade_secs: Option<f64>,
}

/// A single playable track
///
/// Immutable once placed in a [`PlaylistEntry`]; a swap replaces the whole
/// track rather than editing fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Opaque media identifier understood by the embeddable player
    pub media_id: String,

    pub title: String,

    pub artist: String,

    /// Track length in seconds as reported by metadata
    #[serde(rename = "duration")]
    pub duration_secs: f64,

    /// Playback start offset in seconds (skips intros)
    #[serde(default, rename = "startOffset")]
    pub start_offset_secs: Option<f64>,

    #[serde(default)]
    pub transition_hint: Option<TransitionHint>,
}

impl Track {
    /// Create a track with no start offset and no transition hints
    pub fn new(
        media_id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
        duration_secs: f64,
    ) -> Self {
        Self {
            media_id: media_id.into(),
            title: title.into(),
            artist: artist.into(),
            duration_secs,
            start_offset_secs: None,
            transition_hint: None,
        }
    }

    pub fn with_start_offset(mut self, secs: f64) -> Self {
        self.start_offset_secs = Some(secs);
        self
    }

    pub fn with_hint(mut self, hint: TransitionHint) -> Self {
        self.transition_hint = Some(hint);
        self
    }

    /// Start offset clamped to the playable range (0 when absent or invalid)
    pub fn start_offset(&self) -> f64 {
        match self.start_offset_secs {
            Some(secs) if secs.is_finite() && secs > 0.0 && secs < self.duration_secs => secs,
            _ => 0.0,
        }
    }
}

/// Descriptor of the transition from an entry into the one after it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionDescriptor {
    /// Quality label produced by playlist generation (e.g. "smooth")
    pub quality: String,

    /// Transition type label (e.g. "crossfade", "cut")
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, rename = "duration")]
    pub duration_secs: Option<f64>,
}

/// A track placed at an ordinal position in the playlist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistEntry {
    #[serde(default = "Uuid::new_v4")]
    pub id: EntryId,

    #[serde(default)]
    pub position: usize,

    pub track: Track,

    #[serde(default)]
    pub transition: Option<TransitionDescriptor>,
}

impl PlaylistEntry {
    pub fn new(position: usize, track: Track) -> Self {
        Self {
            id: Uuid::new_v4(),
            position,
            track,
            transition: None,
        }
    }

    /// Replace the entry's track wholesale, keeping identity and position
    pub fn swap_track(&mut self, track: Track) {
        self.track = track;
    }
}

/// Build entries from tracks, assigning fresh ids and sequential positions
pub fn entries_from_tracks(tracks: impl IntoIterator<Item = Track>) -> Vec<PlaylistEntry> {
    tracks
        .into_iter()
        .enumerate()
        .map(|(position, track)| PlaylistEntry::new(position, track))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_other() {
        assert_eq!(SlotId::A.other(), SlotId::B);
        assert_eq!(SlotId::B.other(), SlotId::A);
        assert_eq!(SlotId::A.other().other(), SlotId::A);
    }

    #[test]
    fn test_start_offset_ignores_out_of_range_values() {
        let track = Track::new("abc", "T", "A", 120.0);
        assert_eq!(track.start_offset(), 0.0);
        assert_eq!(track.clone().with_start_offset(12.5).start_offset(), 12.5);
        assert_eq!(track.clone().with_start_offset(-3.0).start_offset(), 0.0);
        assert_eq!(track.with_start_offset(500.0).start_offset(), 0.0);
    }

    #[test]
    fn test_entries_from_tracks_assigns_positions() {
        let entries = entries_from_tracks(vec![
            Track::new("a", "A", "X", 100.0),
            Track::new("b", "B", "Y", 200.0),
        ]);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].position, 0);
        assert_eq!(entries[1].position, 1);
        assert_ne!(entries[0].id, entries[1].id);
    }

    #[test]
    fn test_swap_track_keeps_identity() {
        let mut entry = PlaylistEntry::new(3, Track::new("a", "A", "X", 100.0));
        let id = entry.id;
        entry.swap_track(Track::new("z", "Z", "Q", 90.0));
        assert_eq!(entry.id, id);
        assert_eq!(entry.position, 3);
        assert_eq!(entry.track.media_id, "z");
    }

    #[test]
    fn test_deserialize_store_json() {
        let json = r#"{
            "track": {
                "mediaId": "dQw4w9WgXcQ",
                "title": "Song",
                "artist": "Artist",
                "duration": 212.0,
                "startOffset": 4.0,
                "transitionHint": { "mixOutPoint": 12.0, "crossfadeDuration": 8.0 }
            },
            "transition": { "quality": "smooth", "type": "crossfade", "duration": 8.0 }
        }"#;

        let entry: PlaylistEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.track.media_id, "dQw4w9WgXcQ");
        assert_eq!(entry.track.start_offset(), 4.0);
        let hint = entry.track.transition_hint.unwrap();
        assert_eq!(hint.mix_out_point_secs, Some(12.0));
        assert_eq!(hint.crossfade_secs, Some(8.0));
        assert_eq!(entry.transition.unwrap().kind, "crossfade");
    }
}
