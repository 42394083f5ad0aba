//! OS media controls integration via souvlaki.
//!
//! Platform backends:
//! - Windows: System Media Transport Controls (SMTC)
//! - Linux: MPRIS D-Bus interface
//! - macOS: MediaCenter / Now Playing
//!
//! The bridge runs on a dedicated thread. Media-key presses map to
//! [`TransportCommand`]s sent through the controller handle; the
//! controller pushes now-playing metadata back through the
//! [`MediaSessionSink`] implementation.

use crate::controller::{ControllerHandle, MediaSessionSink, TransportCommand};
use crate::model::{TrackDescriptor, TrackSource};
use souvlaki::{MediaControlEvent, MediaControls, MediaMetadata, MediaPlayback, PlatformConfig};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::time::Duration;

/// Now-playing metadata in the shape souvlaki wants.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NowPlaying {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration: Option<Duration>,
    pub cover_url: Option<String>,
}

/// Build the media-session metadata for a track.
pub fn metadata_for(track: &TrackDescriptor) -> NowPlaying {
    let cover_url = match &track.source {
        // Remote artwork is already a URL.
        TrackSource::Remote { .. } => track.artwork_url(),
        TrackSource::Local { cover_path, .. } => cover_path.as_ref().map(|p| {
            format!("file://{}", p.to_string_lossy().replace('\\', "/"))
        }),
    };
    NowPlaying {
        title: Some(track.title.clone()),
        artist: Some(track.artist_line()),
        album: track.album.clone(),
        duration: track.duration,
        cover_url,
    }
}

#[derive(Debug)]
enum BridgeUpdate {
    Metadata(NowPlaying),
    Playing(bool),
    Shutdown,
}

/// Handle to the OS media controls thread.
pub struct MediaControlBridge {
    update_tx: Sender<BridgeUpdate>,
}

impl MediaControlBridge {
    /// Start the media controls thread.
    ///
    /// `hwnd` is the embedder's window handle, required by SMTC on
    /// Windows and ignored elsewhere. Returns `None` if the thread cannot
    /// be spawned; controls failing to initialize later only logs, since
    /// playback works fine without them.
    pub fn new(handle: ControllerHandle, hwnd: Option<usize>) -> Option<Self> {
        let (update_tx, update_rx) = channel::<BridgeUpdate>();

        match std::thread::Builder::new()
            .name("media-controls".into())
            .spawn(move || {
                tracing::info!("media controls thread started");
                match run_media_controls(update_rx, handle, hwnd) {
                    Ok(()) => tracing::info!("media controls thread ended"),
                    Err(e) => tracing::error!("media controls thread error: {e}"),
                }
            }) {
            Ok(_) => Some(Self { update_tx }),
            Err(e) => {
                tracing::error!("failed to spawn media controls thread: {e}");
                None
            }
        }
    }

    pub fn shutdown(&self) {
        let _ = self.update_tx.send(BridgeUpdate::Shutdown);
    }
}

impl Drop for MediaControlBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl MediaSessionSink for MediaControlBridge {
    fn track_changed(&self, track: &TrackDescriptor) {
        let _ = self.update_tx.send(BridgeUpdate::Metadata(metadata_for(track)));
    }

    fn playback_changed(&self, playing: bool) {
        let _ = self.update_tx.send(BridgeUpdate::Playing(playing));
    }
}

/// Map an OS media-control event to a transport command. Events with no
/// transport meaning (raise, quit, open-uri) map to `None`.
fn map_event(event: MediaControlEvent) -> Option<TransportCommand> {
    match event {
        MediaControlEvent::Play => Some(TransportCommand::Play),
        MediaControlEvent::Pause | MediaControlEvent::Stop => Some(TransportCommand::Pause),
        MediaControlEvent::Toggle => Some(TransportCommand::Toggle),
        MediaControlEvent::Next => Some(TransportCommand::Next),
        MediaControlEvent::Previous => Some(TransportCommand::Previous),
        MediaControlEvent::SetPosition(pos) => {
            Some(TransportCommand::SeekTo(pos.0.as_secs_f64()))
        }
        MediaControlEvent::SetVolume(volume) => {
            Some(TransportCommand::SetVolume(volume as f32))
        }
        _ => None,
    }
}

/// Media controls event loop on the dedicated thread.
fn run_media_controls(
    update_rx: Receiver<BridgeUpdate>,
    handle: ControllerHandle,
    hwnd: Option<usize>,
) -> Result<(), String> {
    // Raw pointers are not Send, so the handle crosses the thread
    // boundary as a usize and is cast back here.
    let hwnd = hwnd.map(|h| h as *mut std::ffi::c_void);

    let config = PlatformConfig {
        dbus_name: "tunedeck",
        display_name: "Tunedeck",
        hwnd,
    };

    let mut controls = MediaControls::new(config)
        .map_err(|e| format!("failed to create media controls: {e:?}"))?;

    controls
        .attach(move |event: MediaControlEvent| {
            tracing::debug!("media control event: {:?}", event);
            if let Some(command) = map_event(event) {
                handle.send(command);
            }
        })
        .map_err(|e| format!("failed to attach event handler: {e:?}"))?;

    // Register as a media app before any track plays so the keys are
    // responsive from the first press.
    controls
        .set_metadata(MediaMetadata {
            title: Some("Tunedeck"),
            artist: None,
            album: None,
            duration: None,
            cover_url: None,
        })
        .map_err(|e| format!("failed to set initial metadata: {e:?}"))?;
    controls
        .set_playback(MediaPlayback::Stopped)
        .map_err(|e| format!("failed to set initial playback state: {e:?}"))?;

    tracing::info!("media controls initialized");

    loop {
        match update_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(BridgeUpdate::Metadata(meta)) => {
                let metadata = MediaMetadata {
                    title: meta.title.as_deref(),
                    artist: meta.artist.as_deref(),
                    album: meta.album.as_deref(),
                    duration: meta.duration,
                    cover_url: meta.cover_url.as_deref(),
                };
                if let Err(e) = controls.set_metadata(metadata) {
                    tracing::warn!("failed to set media metadata: {:?}", e);
                }
            }
            Ok(BridgeUpdate::Playing(playing)) => {
                let playback = if playing {
                    MediaPlayback::Playing { progress: None }
                } else {
                    MediaPlayback::Paused { progress: None }
                };
                if let Err(e) = controls.set_playback(playback) {
                    tracing::debug!("failed to set playback state: {:?}", e);
                }
            }
            Ok(BridgeUpdate::Shutdown) => break,
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    Ok(())
}
