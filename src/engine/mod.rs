//! Sound-engine abstraction and playback sessions.
//!
//! The controller never talks to audio output directly. It creates one
//! [`PlaybackSession`] per loaded track: a fresh engine instance from the
//! [`SoundEngineFactory`], tagged with a monotonically increasing
//! [`SessionId`]. Engine events are forwarded back to the controller
//! stamped with the session id so events from a torn-down session can be
//! recognized and dropped.

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::model::TrackDescriptor;

/// Identity of one engine session. Ids never repeat within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

impl SessionId {
    pub fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Asynchronous notifications from the sound engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Media loaded and ready to play
    Loaded,
    /// Playback started or resumed
    Playing,
    /// Playback paused
    Paused,
    /// The track played to its natural end
    Ended,
    /// Loading failed; the code mirrors the media-error taxonomy
    /// (1 aborted, 2 network, 3 decode, 4 unsupported)
    LoadFailed(u32),
}

/// Lifecycle state of the current session as the controller sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Ended,
    Failed,
}

/// One audio output instance.
///
/// Methods take `&self`; implementations use interior mutability so the
/// engine can be shared between the controller and the progress sampler.
#[async_trait]
pub trait SoundEngine: Send + Sync {
    /// Begin loading the media at `url`. Completion is reported through
    /// [`EngineEvent::Loaded`] or [`EngineEvent::LoadFailed`].
    async fn load(&self, url: &str) -> Result<()>;

    fn play(&self);
    fn pause(&self);
    fn stop(&self);
    fn seek(&self, position: Duration);
    fn position(&self) -> Duration;
    fn duration(&self) -> Option<Duration>;
    fn is_playing(&self) -> bool;
    fn set_volume(&self, volume: f32);
    fn set_rate(&self, rate: f32);

    /// Ramp volume from `from` to `to` over `over`. A zero duration
    /// applies `to` immediately.
    async fn fade(&self, from: f32, to: f32, over: Duration);

    /// Release decoder and buffer resources. The engine must emit no
    /// further events after this returns.
    fn unload(&self);
}

/// Creates engine instances wired to an event channel.
pub trait SoundEngineFactory: Send + Sync {
    fn create(&self, events: mpsc::UnboundedSender<EngineEvent>) -> Result<Arc<dyn SoundEngine>>;
}

/// A live engine bound to one track.
pub struct PlaybackSession {
    pub id: SessionId,
    pub track: TrackDescriptor,
    pub engine: Arc<dyn SoundEngine>,
    /// Task forwarding engine events to the controller, stamped with `id`
    forwarder: JoinHandle<()>,
}

impl PlaybackSession {
    /// The id is allocated before the forwarder task is spawned so the
    /// forwarder can stamp events with it.
    pub fn new(
        id: SessionId,
        track: TrackDescriptor,
        engine: Arc<dyn SoundEngine>,
        forwarder: JoinHandle<()>,
    ) -> Self {
        Self {
            id,
            track,
            engine,
            forwarder,
        }
    }

    /// Tear the session down.
    ///
    /// The forwarder is aborted before the engine is stopped so no event
    /// from the dying session can race the next session's creation.
    pub fn teardown(self) {
        self.forwarder.abort();
        self.engine.stop();
        self.engine.unload();
    }
}
