//! Error types for ytdj-player
//!
//! Errors here never cross into the UI layer as panics: slot failures are
//! recovered inside the core, and the handle only reports a missing engine.

use thiserror::Error;

/// Main error type for ytdj-player
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Playlist edits that would break cursor invariants
    #[error("Playlist error: {0}")]
    Playlist(String),

    /// Engine task has exited; commands can no longer be delivered
    #[error("Transition engine is not running")]
    EngineClosed,

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Playlist file parse errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Common(#[from] ytdj_common::Error),
}

/// Convenience Result type using ytdj-player Error
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported synchronously by a media player call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlotError {
    /// Widget has not signalled ready yet
    #[error("player not ready")]
    NotReady,

    /// Widget refused the call
    #[error("player rejected call: {0}")]
    Rejected(String),
}
