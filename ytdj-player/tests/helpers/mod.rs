//! Test helpers for ytdj-player integration tests
//!
//! Provides:
//! - EngineHarness: engine over two simulated players with probes
//! - Paused-clock time helpers (`at`)
//! - Event draining and naming for sequence assertions

#![allow(dead_code)]

pub mod harness;

pub use harness::{event_name, EngineHarness, HarnessBuilder};
