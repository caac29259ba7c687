//! Playback/queue controller.
//!
//! [`PlaybackController`] is a handle to a runner task that owns the current
//! track, the single active audio resource and the queue. Commands from handles
//! and completions from the audio backend are processed one at a time by the
//! runner, so a late load can never overwrite a newer one.

mod config;
mod controller;
mod error;
mod runner;


pub use config::ControllerConfig;
pub use controller::{PlayOutcome, PlaybackController};
pub use error::{PlaybackError, Result};
