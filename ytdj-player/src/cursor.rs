//! Playlist cursor
//!
//! Tracks which playlist entry is active and supplies the next entry for
//! preloading. Entries that failed to load are marked unplayable and skipped
//! by navigation.
//!
//! Invariant: `index` is `None` (nothing playing) or `< entries.len()`.

use crate::error::{Error, Result};
use std::collections::HashSet;
use ytdj_common::{EntryId, PlaylistEntry};

#[derive(Debug, Clone, Default)]
pub struct PlaylistCursor {
    entries: Vec<PlaylistEntry>,
    index: Option<usize>,
    unplayable: HashSet<EntryId>,
}

impl PlaylistCursor {
    /// Create a cursor over `entries` with nothing active
    pub fn new(entries: Vec<PlaylistEntry>) -> Self {
        Self {
            entries,
            index: None,
            unplayable: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[PlaylistEntry] {
        &self.entries
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn entry(&self, index: usize) -> Option<&PlaylistEntry> {
        self.entries.get(index)
    }

    pub fn position_of(&self, id: EntryId) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    /// Active entry, if any
    pub fn current(&self) -> Option<&PlaylistEntry> {
        self.index.and_then(|i| self.entries.get(i))
    }

    /// Begin at the first playable entry at or after `index`
    pub fn start_at(&mut self, index: usize) -> Option<usize> {
        let start = self.first_playable_from(index)?;
        self.index = Some(start);
        Some(start)
    }

    /// Make `index` active; returns false if out of range
    pub fn jump_to(&mut self, index: usize) -> bool {
        if index >= self.entries.len() {
            return false;
        }
        self.index = Some(index);
        true
    }

    /// Advance to the next playable entry; no-op at the end
    pub fn next(&mut self) -> bool {
        match self.peek_next_index() {
            Some(i) => {
                self.index = Some(i);
                true
            }
            None => false,
        }
    }

    /// Retreat to the previous playable entry; no-op at the start
    pub fn previous(&mut self) -> bool {
        match self.peek_previous_index() {
            Some(i) => {
                self.index = Some(i);
                true
            }
            None => false,
        }
    }

    /// Entry after the current one, without moving
    pub fn peek_next(&self) -> Option<&PlaylistEntry> {
        self.peek_next_index().and_then(|i| self.entries.get(i))
    }

    pub fn peek_next_index(&self) -> Option<usize> {
        let start = self.index? + 1;
        (start..self.entries.len()).find(|&i| self.is_playable_at(i))
    }

    pub fn peek_previous_index(&self) -> Option<usize> {
        let current = self.index?;
        (0..current).rev().find(|&i| self.is_playable_at(i))
    }

    /// First playable entry at or after `index`
    pub fn first_playable_from(&self, index: usize) -> Option<usize> {
        (index..self.entries.len()).find(|&i| self.is_playable_at(i))
    }

    /// True when nothing playable follows the current entry
    pub fn is_last(&self) -> bool {
        self.peek_next_index().is_none()
    }

    pub fn mark_unplayable(&mut self, id: EntryId) {
        self.unplayable.insert(id);
    }

    pub fn is_playable(&self, id: EntryId) -> bool {
        !self.unplayable.contains(&id)
    }

    fn is_playable_at(&self, index: usize) -> bool {
        self.entries
            .get(index)
            .map(|e| self.is_playable(e.id))
            .unwrap_or(false)
    }

    /// Replace the playlist after an edit (reorder, insert, remove, swap)
    ///
    /// The active entry is relocated by id. Removing the active entry is
    /// refused because a playback slot still references it.
    pub fn replace(&mut self, mut entries: Vec<PlaylistEntry>) -> Result<()> {
        let new_index = match self.current() {
            Some(current) => {
                let id = current.id;
                let position = entries.iter().position(|e| e.id == id).ok_or_else(|| {
                    Error::Playlist(format!("active entry {} cannot be removed", id))
                })?;
                Some(position)
            }
            None => None,
        };

        for (position, entry) in entries.iter_mut().enumerate() {
            entry.position = position;
        }
        self.unplayable
            .retain(|id| entries.iter().any(|e| e.id == *id));
        self.entries = entries;
        self.index = new_index;
        Ok(())
    }
}
