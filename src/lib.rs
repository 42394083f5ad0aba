//! Tunedeck - music playback orchestration.
//!
//! This crate implements the playback core of a music player: it turns
//! track descriptors into playable URLs, drives a pluggable sound engine
//! through the load/play/pause/end lifecycle, advances the queue by play
//! mode, samples progress for the UI, and bridges to OS media controls.
//! It renders nothing itself; the embedder supplies the sound engine and
//! receives state through shared snapshots and callback traits.
//!
//! The pieces:
//! - [`controller`]: the playback state machine and transport commands
//! - [`engine`]: the sound-engine abstraction and session lifecycle
//! - [`resolver`]: primary + unblock-fallback URL resolution
//! - [`lyrics`]: LRC fetching, parsing, and active-line indexing
//! - [`sampler`]: coarse/fine progress sampling
//! - [`media_controls`]: OS media keys and now-playing metadata
//! - [`config`]: TOML configuration and persisted playback state

pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod lyrics;
pub mod media_controls;
pub mod model;
pub mod notify;
pub mod resolver;
pub mod sampler;

#[cfg(test)]
pub mod test_utils;

pub use controller::{
    ControllerDeps, ControllerEvent, ControllerHandle, ControllerSettings, PlaybackController,
    TransportCommand,
};
pub use engine::{EngineEvent, SessionId, SessionState, SoundEngine, SoundEngineFactory};
pub use error::{PlaybackError, Result};
pub use model::{PlayMode, ProgressSnapshot, TrackDescriptor, TrackSource};
