//! # YTDJ Common Library
//!
//! Shared code for the YTDJ playback core including:
//! - Playlist data model (tracks, entries, transition hints)
//! - Event types (TransitionEvent enum) and the EventBus
//! - Transition settings and configuration loading
//! - Fade curve definitions and calculations

pub mod config;
pub mod error;
pub mod events;
pub mod fade_curves;
pub mod model;
pub mod settings;

pub use error::{Error, Result};
pub use fade_curves::FadeCurve;
pub use model::{EntryId, PlaylistEntry, SlotId, Track, TransitionDescriptor, TransitionHint};
pub use settings::{TransitionMode, TransitionSettings};
