//! Time-indexed lyric handling.
//!
//! Lyrics arrive as raw LRC text in up to two variants: plain line-synced
//! and word-synced. Both parse into the same `[LyricLine]` shape; the
//! `has_word_sync` flag decides which variant drives the active-line index
//! the coarse sampler computes.
//!
//! Lyric failures are never fatal to playback: the service logs and hands
//! back an empty track.

mod client;

pub use client::HttpLyricApi;

use crate::error::Result;
use crate::model::{TrackDescriptor, TrackSource};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// One timed lyric line.
#[derive(Debug, Clone, PartialEq)]
pub struct LyricLine {
    /// Timestamp the line becomes active
    pub time: Duration,
    pub text: String,
}

/// Parsed lyrics for one track.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LyricTrack {
    /// Line-synced lyrics
    pub plain: Vec<LyricLine>,
    /// Word-synced lyrics (line granularity after parsing)
    pub word_synced: Vec<LyricLine>,
    pub has_word_sync: bool,
    pub has_translation: bool,
    pub has_romanization: bool,
}

impl LyricTrack {
    /// Lyrics with no content at all.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.plain.is_empty() && self.word_synced.is_empty()
    }

    /// The variant that should drive the active-line index.
    pub fn active_lines(&self, prefer_word_sync: bool) -> &[LyricLine] {
        if self.has_word_sync && prefer_word_sync {
            &self.word_synced
        } else {
            &self.plain
        }
    }
}

/// Raw payload from a lyric source, before parsing.
#[derive(Debug, Clone, Default)]
pub struct RawLyricPayload {
    /// Plain LRC text
    pub plain: Option<String>,
    /// Word-synced LRC text
    pub word_synced: Option<String>,
    pub has_translation: bool,
    pub has_romanization: bool,
}

/// Upstream lyric source (remote API or local sidecar reader).
#[async_trait]
pub trait LyricApi: Send + Sync {
    /// Fetch lyrics for a remote track. `Ok(None)` means "no lyrics".
    async fn remote_lyrics(&self, id: u64) -> Result<Option<RawLyricPayload>>;

    /// Read lyrics for a local file. `Ok(None)` means "no lyrics".
    async fn local_lyrics(&self, path: &Path) -> Result<Option<String>>;
}

/// Fetches and parses lyrics for the current track.
#[derive(Clone)]
pub struct LyricService {
    api: Arc<dyn LyricApi>,
}

impl LyricService {
    pub fn new(api: Arc<dyn LyricApi>) -> Self {
        Self { api }
    }

    /// Fetch and parse lyrics for a track.
    ///
    /// Never fails: any error is logged and an empty track returned, so a
    /// lyric outage cannot interrupt playback.
    pub async fn fetch(&self, track: &TrackDescriptor) -> LyricTrack {
        let result = match &track.source {
            TrackSource::Local { path, .. } => self
                .api
                .local_lyrics(path)
                .await
                .map(|raw| raw.map(RawLyricPayload::from_plain)),
            TrackSource::Remote { id, .. } => self.api.remote_lyrics(*id).await,
        };

        match result {
            Ok(Some(payload)) => parse_payload(&payload),
            Ok(None) => {
                tracing::debug!("no lyrics available for {:?}", track.title);
                LyricTrack::empty()
            }
            Err(e) => {
                tracing::warn!("lyric fetch failed for {:?}: {}", track.title, e);
                LyricTrack::empty()
            }
        }
    }
}

impl RawLyricPayload {
    fn from_plain(text: String) -> Self {
        Self {
            plain: Some(text),
            ..Default::default()
        }
    }
}

/// Parse a raw payload into a [`LyricTrack`].
pub fn parse_payload(payload: &RawLyricPayload) -> LyricTrack {
    let plain = payload.plain.as_deref().map(parse_lrc).unwrap_or_default();
    let word_synced = payload
        .word_synced
        .as_deref()
        .map(parse_lrc)
        .unwrap_or_default();
    LyricTrack {
        has_word_sync: !word_synced.is_empty(),
        has_translation: payload.has_translation,
        has_romanization: payload.has_romanization,
        plain,
        word_synced,
    }
}

/// Parse LRC text into timed lines, sorted by timestamp.
///
/// Handles multiple timestamps per line (`[00:05.00][00:45.00]chorus`) and
/// skips metadata tags like `[ar:...]`.
pub fn parse_lrc(raw: &str) -> Vec<LyricLine> {
    let mut lines = Vec::new();

    for line in raw.lines() {
        let mut rest = line.trim();
        let mut times = Vec::new();

        while let Some(stripped) = rest.strip_prefix('[') {
            let Some(end) = stripped.find(']') else {
                break;
            };
            let tag = &stripped[..end];
            rest = &stripped[end + 1..];
            if let Some(time) = parse_timestamp(tag) {
                times.push(time);
            }
        }

        let text = rest.trim();
        if text.is_empty() {
            continue;
        }
        for time in times {
            lines.push(LyricLine {
                time,
                text: text.to_string(),
            });
        }
    }

    lines.sort_by_key(|l| l.time);
    lines
}

/// Parse an `mm:ss`, `mm:ss.xx`, or `mm:ss.xxx` timestamp tag.
fn parse_timestamp(tag: &str) -> Option<Duration> {
    let (minutes, seconds) = tag.split_once(':')?;
    let minutes: u64 = minutes.trim().parse().ok()?;
    let seconds: f64 = seconds.trim().parse().ok()?;
    if !(0.0..60.0).contains(&seconds) {
        return None;
    }
    Some(Duration::from_secs_f64(minutes as f64 * 60.0 + seconds))
}

/// Index of the lyric line active at `position`.
///
/// The active line is the one before the first line whose timestamp is at
/// or past the position; past the final timestamp the last line stays
/// active. `None` means no line is active yet.
pub fn active_line_index(lines: &[LyricLine], position: Duration) -> Option<usize> {
    if lines.is_empty() {
        return None;
    }
    match lines.iter().position(|l| l.time >= position) {
        Some(0) => None,
        Some(i) => Some(i - 1),
        None => Some(lines.len() - 1),
    }
}
