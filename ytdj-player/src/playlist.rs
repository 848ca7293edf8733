//! Playlist file loading
//!
//! Reads the JSON playlist exported by the playlist store: an array of
//! entries, each wrapping a track and an optional transition descriptor.
//! Missing ids are generated and positions are renumbered from file order.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};
use ytdj_common::PlaylistEntry;

/// Parse a playlist from JSON text
///
/// Entries without a positive, finite duration cannot be scheduled and are
/// dropped with a warning.
pub fn parse_playlist(json: &str) -> Result<Vec<PlaylistEntry>> {
    let entries: Vec<PlaylistEntry> = serde_json::from_str(json)?;
    let mut playable: Vec<PlaylistEntry> = entries
        .into_iter()
        .enumerate()
        .filter_map(|(position, entry)| {
            let duration = entry.track.duration_secs;
            if duration.is_finite() && duration > 0.0 {
                Some(entry)
            } else {
                warn!(
                    "Skipping entry {} ('{}') with invalid duration {}",
                    position, entry.track.title, duration
                );
                None
            }
        })
        .collect();
    for (position, entry) in playable.iter_mut().enumerate() {
        entry.position = position;
    }
    Ok(playable)
}

/// Load a playlist file
pub fn load_playlist(path: &Path) -> Result<Vec<PlaylistEntry>> {
    let content = std::fs::read_to_string(path)?;
    let entries = parse_playlist(&content)?;
    if entries.is_empty() {
        return Err(Error::Playlist(format!(
            "{} contains no playable entries",
            path.display()
        )));
    }
    debug!("Loaded {} entries from {}", entries.len(), path.display());
    Ok(entries)
}

/// Media id to duration map for the simulated player
pub fn media_catalog(entries: &[PlaylistEntry]) -> HashMap<String, f64> {
    entries
        .iter()
        .map(|e| (e.track.media_id.clone(), e.track.duration_secs))
        .collect()
}
