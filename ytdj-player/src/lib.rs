//! # YTDJ Player
//!
//! Playback transition core: keeps two media player slots alternating so the
//! next track is always cued, and crossfades between them at each track's
//! mix-out point.
//!
//! **Architecture:**
//! - [`slot`]: best-effort wrapper around one embeddable player
//! - [`cursor`]: active playlist position
//! - [`preload`]: cues the next entry in the inactive slot
//! - [`crossfade`]: per-step volume ramps
//! - [`scheduler`]: transition table and role swaps
//! - [`engine`]: tokio task owning timers and the command channel
//! - [`sim`]: simulated player for tests and the demo binary

pub mod context;
pub mod crossfade;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod playlist;
pub mod preload;
pub mod scheduler;
pub mod sim;
pub mod slot;

pub use context::{PlaybackContext, TransitionState};
pub use engine::{EngineConfig, TransitionEngine, TransitionEngineHandle};
pub use error::{Error, Result};
pub use scheduler::SkipDirection;
