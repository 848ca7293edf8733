//! Playback slots
//!
//! A slot wraps one instance of the embeddable media player. Two slots (A and
//! B) exist for the lifetime of the engine; one is audible while the other
//! holds the preloaded next track.
//!
//! All slot operations are best-effort. The widget initializes
//! asynchronously, so calls made before it signals ready are skipped
//! (returning `false`) and the caller re-issues them once `Ready` arrives.
//! A load requested before ready is held and applied on ready.

use crate::error::SlotError;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use ytdj_common::{EntryId, PlaylistEntry};

pub use ytdj_common::SlotId;

/// Widget playback state as reported through state-change events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Unstarted,
    Buffering,
    Playing,
    Paused,
    Ended,
}

/// Event emitted by a media player
#[derive(Debug, Clone, PartialEq)]
pub enum SlotEvent {
    /// Widget finished initializing and accepts calls
    Ready,
    StateChanged(PlayerState),
    /// Media failed to load or play; widget-specific error code
    Error(i32),
}

/// Slot event tagged with the slot it came from
#[derive(Debug, Clone, PartialEq)]
pub struct SlotNotice {
    pub slot: SlotId,
    pub event: SlotEvent,
}

/// Observer handed to a media player on subscription
///
/// Tags every event with the slot id and forwards it to the engine's event
/// channel.
#[derive(Debug, Clone)]
pub struct SlotListener {
    slot: SlotId,
    tx: mpsc::UnboundedSender<SlotNotice>,
}

impl SlotListener {
    pub fn new(slot: SlotId, tx: mpsc::UnboundedSender<SlotNotice>) -> Self {
        Self { slot, tx }
    }

    pub fn slot(&self) -> SlotId {
        self.slot
    }

    /// Forward an event; returns false once the engine has gone away
    pub fn emit(&self, event: SlotEvent) -> bool {
        self.tx
            .send(SlotNotice {
                slot: self.slot,
                event,
            })
            .is_ok()
    }
}

/// Embeddable media player capability
///
/// Implementations wrap a concrete widget. Media is addressed by an opaque
/// identifier; volumes are 0-100; positions are seconds.
pub trait MediaPlayer: Send {
    /// Cue media at `start_secs`, paused
    fn load(&mut self, media_id: &str, start_secs: f64) -> Result<(), SlotError>;

    fn play(&mut self) -> Result<(), SlotError>;

    fn pause(&mut self) -> Result<(), SlotError>;

    fn seek(&mut self, secs: f64) -> Result<(), SlotError>;

    fn set_volume(&mut self, volume: u8) -> Result<(), SlotError>;

    /// Current playback position, if media is loaded
    fn current_time(&self) -> Option<f64>;

    /// Media duration, if known
    fn duration(&self) -> Option<f64>;

    /// Register the observer receiving ready/state/error events
    fn subscribe(&mut self, listener: SlotListener);

    fn unsubscribe(&mut self);
}

/// Load requested before the widget was ready
#[derive(Debug, Clone, PartialEq)]
struct PendingLoad {
    media_id: String,
    start_secs: f64,
}

/// One of the two playback holders
pub struct PlaybackSlot {
    id: SlotId,
    player: Box<dyn MediaPlayer>,
    ready: bool,
    /// Last requested volume (0-100), re-applied on ready
    volume: u8,
    /// Playlist entry currently loaded (or pending)
    entry: Option<EntryId>,
    pending_load: Option<PendingLoad>,
    subscribed: bool,
}

impl PlaybackSlot {
    pub fn new(id: SlotId, player: Box<dyn MediaPlayer>) -> Self {
        Self {
            id,
            player,
            ready: false,
            volume: 0,
            entry: None,
            pending_load: None,
            subscribed: false,
        }
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Entry loaded into this slot, if any
    pub fn entry(&self) -> Option<EntryId> {
        self.entry
    }

    /// Subscribe once to the widget's event stream
    pub fn subscribe(&mut self, tx: mpsc::UnboundedSender<SlotNotice>) {
        if self.subscribed {
            return;
        }
        self.player.subscribe(SlotListener::new(self.id, tx));
        self.subscribed = true;
    }

    pub fn unsubscribe(&mut self) {
        if self.subscribed {
            self.player.unsubscribe();
            self.subscribed = false;
        }
    }

    /// Handle the widget's ready signal
    ///
    /// Applies a load held while not ready, then the last requested volume.
    pub fn mark_ready(&mut self) {
        if self.ready {
            return;
        }
        self.ready = true;
        debug!("Slot {} ready", self.id);

        if let Some(pending) = self.pending_load.take() {
            let PendingLoad {
                media_id,
                start_secs,
            } = pending;
            self.apply("load", |p| p.load(&media_id, start_secs));
        }
        let volume = self.volume;
        self.apply("set_volume", |p| p.set_volume(volume));
    }

    /// Load an entry's media, cued paused at its start offset
    ///
    /// Returns false when the load was deferred until ready or rejected.
    pub fn load(&mut self, entry: &PlaylistEntry) -> bool {
        let media_id = entry.track.media_id.clone();
        let start_secs = entry.track.start_offset();
        self.entry = Some(entry.id);

        if !self.ready {
            trace!("Slot {} not ready, deferring load of {}", self.id, media_id);
            self.pending_load = Some(PendingLoad {
                media_id,
                start_secs,
            });
            return false;
        }

        self.pending_load = None;
        self.apply("load", |p| p.load(&media_id, start_secs))
    }

    /// Forget the loaded entry (after a load failure)
    pub fn clear_entry(&mut self) {
        self.entry = None;
        self.pending_load = None;
    }

    pub fn play(&mut self) -> bool {
        self.apply("play", |p| p.play())
    }

    pub fn pause(&mut self) -> bool {
        self.apply("pause", |p| p.pause())
    }

    pub fn seek(&mut self, secs: f64) -> bool {
        self.apply("seek", |p| p.seek(secs.max(0.0)))
    }

    /// Request a volume; recorded even if the widget is not ready yet
    pub fn set_volume(&mut self, volume: u8) -> bool {
        let volume = volume.min(100);
        self.volume = volume;
        self.apply("set_volume", |p| p.set_volume(volume))
    }

    /// Playback position; `None` until ready and loaded
    pub fn current_time(&self) -> Option<f64> {
        if !self.ready {
            return None;
        }
        self.player.current_time()
    }

    pub fn duration(&self) -> Option<f64> {
        if !self.ready {
            return None;
        }
        self.player.duration().filter(|d| d.is_finite() && *d > 0.0)
    }

    fn apply<F>(&mut self, op: &'static str, f: F) -> bool
    where
        F: FnOnce(&mut dyn MediaPlayer) -> Result<(), SlotError>,
    {
        if !self.ready {
            trace!("Slot {} not ready, skipping {}", self.id, op);
            return false;
        }

        match f(self.player.as_mut()) {
            Ok(()) => true,
            Err(SlotError::NotReady) => {
                trace!("Slot {} reported not ready, skipping {}", self.id, op);
                false
            }
            Err(e) => {
                warn!("Slot {} {} failed: {}", self.id, op, e);
                false
            }
        }
    }
}

impl std::fmt::Debug for PlaybackSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSlot")
            .field("id", &self.id)
            .field("ready", &self.ready)
            .field("volume", &self.volume)
            .field("entry", &self.entry)
            .finish()
    }
}
