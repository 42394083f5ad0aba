//! Core playback data model.
//!
//! A [`TrackDescriptor`] identifies one playable track: either a remote
//! catalog entry (streamed after URL resolution) or a local file. The
//! discriminator is a tagged enum so the two kinds can never be mixed up
//! by shape-sniffing.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Artwork thumbnails served by the remote catalog, by size tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtworkSet {
    /// ~100px thumbnail
    pub small: Option<String>,
    /// ~300px thumbnail
    pub medium: Option<String>,
    /// ~1024px image
    pub large: Option<String>,
}

/// Where a track's audio comes from.
///
/// A track is a remote catalog entry or a local file, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackSource {
    /// Remote catalog entry, resolved to a streaming URL at play time.
    Remote { id: u64, artwork: ArtworkSet },
    /// Local file played from its stored path.
    Local {
        path: PathBuf,
        /// Extracted or sidecar cover image, if any
        cover_path: Option<PathBuf>,
    },
}

/// Immutable description of one playable track.
///
/// Once selected as the current track this is never mutated; a new
/// selection replaces the whole value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    pub source: TrackSource,
    pub title: String,
    pub artists: Vec<String>,
    pub album: Option<String>,
    pub duration: Option<Duration>,
}

impl TrackDescriptor {
    /// Create a remote track with just an id and title.
    pub fn remote(id: u64, title: impl Into<String>) -> Self {
        Self {
            source: TrackSource::Remote {
                id,
                artwork: ArtworkSet::default(),
            },
            title: title.into(),
            artists: Vec::new(),
            album: None,
            duration: None,
        }
    }

    /// Create a local track from a file path.
    pub fn local(path: impl Into<PathBuf>, title: impl Into<String>) -> Self {
        Self {
            source: TrackSource::Local {
                path: path.into(),
                cover_path: None,
            },
            title: title.into(),
            artists: Vec::new(),
            album: None,
            duration: None,
        }
    }

    /// Whether this track plays from a local file.
    pub fn is_local(&self) -> bool {
        matches!(self.source, TrackSource::Local { .. })
    }

    /// Remote catalog id, if this is a remote track.
    pub fn remote_id(&self) -> Option<u64> {
        match &self.source {
            TrackSource::Remote { id, .. } => Some(*id),
            TrackSource::Local { .. } => None,
        }
    }

    /// Local file path, if this is a local track.
    pub fn local_path(&self) -> Option<&PathBuf> {
        match &self.source {
            TrackSource::Local { path, .. } => Some(path),
            TrackSource::Remote { .. } => None,
        }
    }

    /// Best available artwork image, preferring the largest tier.
    pub fn artwork_url(&self) -> Option<String> {
        match &self.source {
            TrackSource::Remote { artwork, .. } => artwork
                .large
                .clone()
                .or_else(|| artwork.medium.clone())
                .or_else(|| artwork.small.clone()),
            TrackSource::Local { cover_path, .. } => cover_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
        }
    }

    /// Joined artist line for display ("A / B").
    pub fn artist_line(&self) -> String {
        if self.artists.is_empty() {
            "Unknown Artist".to_string()
        } else {
            self.artists.join(" / ")
        }
    }

    /// Identity comparison: same remote id or same local path.
    pub fn same_track(&self, other: &TrackDescriptor) -> bool {
        match (&self.source, &other.source) {
            (TrackSource::Remote { id: a, .. }, TrackSource::Remote { id: b, .. }) => a == b,
            (TrackSource::Local { path: a, .. }, TrackSource::Local { path: b, .. }) => a == b,
            _ => false,
        }
    }
}

/// How the queue advances when a track ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayMode {
    /// Step through the queue in order, wrapping at both ends
    #[default]
    Sequential,
    /// Pick a uniformly random queue index
    Random,
    /// Restart the current track in place
    RepeatOne,
    /// Queue-less playback fed by an external recommendation feed
    Radio,
}

/// Read-only progress snapshot recomputed on every coarse sampler tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressSnapshot {
    /// Current playback position
    pub current_time: Duration,
    /// Total track duration as reported by the engine
    pub duration: Duration,
    /// Fraction played, 0.0 - 1.0
    pub fraction_played: f64,
    /// Position formatted as M:SS
    pub formatted_elapsed: String,
    /// Duration formatted as M:SS
    pub formatted_duration: String,
    /// Index of the active lyric line, `None` before the first line
    pub active_lyric_line: Option<usize>,
}

impl ProgressSnapshot {
    /// Fraction played as a 0-100 percentage (for taskbar progress).
    pub fn percent_played(&self) -> f64 {
        self.fraction_played * 100.0
    }
}

/// Format a duration as MM:SS or HH:MM:SS.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{}:{:02}", mins, secs)
    }
}
