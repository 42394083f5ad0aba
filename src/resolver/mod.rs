//! Playable-URL resolution.
//!
//! Given a track descriptor, [`SourceResolver`] produces a playable URL or
//! reports unavailability. Remote tracks try the primary song-URL API at
//! the configured quality tier first; when that yields nothing and the
//! fallback is allowed, an external unblock resolver is consulted. Some
//! fallback URLs point at a secondary-hosted media blob that must be
//! fetched (base64 over IPC), decoded, and registered as a locally
//! addressable object; the previous registration is released before the
//! new one replaces it so references never leak.

mod http;

pub use http::HttpSongApi;

use crate::config::SongQuality;
use crate::error::Result;
use crate::model::{TrackDescriptor, TrackSource};
use async_trait::async_trait;
use base64::Engine as _;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// One URL candidate from the primary source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlCandidate {
    pub url: String,
    /// Upstream only offers a trial clip of this track
    pub trial_only: bool,
}

/// Primary song-URL source.
#[async_trait]
pub trait SongUrlApi: Send + Sync {
    /// Request a streaming URL at the given quality tier.
    /// `Ok(None)` means the catalog has no candidate at all.
    async fn song_url(&self, id: u64, quality: SongQuality) -> Result<Option<UrlCandidate>>;
}

/// External unblock collaborator reached over IPC.
#[async_trait]
pub trait UnblockResolver: Send + Sync {
    /// Resolve a track to a direct media URL, or `None` when no
    /// alternative source exists.
    async fn resolve(&self, track: &TrackDescriptor) -> Result<Option<String>>;

    /// Fetch the raw media bytes behind an indirect URL, base64-encoded.
    async fn fetch_blob(&self, url: &str) -> Result<String>;

    /// Whether `url` points at a secondary-hosted blob that needs
    /// [`fetch_blob`](Self::fetch_blob) before it can play.
    fn is_indirect(&self, url: &str) -> bool;
}

/// Registry for locally-addressable media blobs.
pub trait BlobRegistry: Send + Sync {
    /// Store bytes and return a URI addressing them.
    fn store(&self, bytes: Vec<u8>) -> String;

    /// Release a previously stored blob.
    fn release(&self, uri: &str);
}

/// In-memory blob registry handing out `blob://` URIs.
#[derive(Default)]
pub struct MemoryBlobRegistry {
    blobs: Mutex<HashMap<u64, Vec<u8>>>,
    next_id: AtomicU64,
}

impl MemoryBlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live blobs (for leak checks).
    pub fn len(&self) -> usize {
        self.blobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.lock().is_empty()
    }
}

impl BlobRegistry for MemoryBlobRegistry {
    fn store(&self, bytes: Vec<u8>) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.blobs.lock().insert(id, bytes);
        format!("blob://{id}")
    }

    fn release(&self, uri: &str) {
        let Some(id) = uri.strip_prefix("blob://").and_then(|s| s.parse().ok()) else {
            return;
        };
        self.blobs.lock().remove(&id);
    }
}

/// Resolves track descriptors to playable URLs.
pub struct SourceResolver {
    api: Arc<dyn SongUrlApi>,
    unblock: Option<Arc<dyn UnblockResolver>>,
    blobs: Arc<dyn BlobRegistry>,
    quality: SongQuality,
    /// Running in a restricted execution context where trial-only
    /// candidates must be rejected (the fallback exists to replace them)
    restricted_context: bool,
    last_blob: Mutex<Option<String>>,
}

impl SourceResolver {
    pub fn new(api: Arc<dyn SongUrlApi>, quality: SongQuality) -> Self {
        Self {
            api,
            unblock: None,
            blobs: Arc::new(MemoryBlobRegistry::new()),
            quality,
            restricted_context: false,
            last_blob: Mutex::new(None),
        }
    }

    /// Attach the unblock fallback resolver.
    pub fn with_unblock(mut self, unblock: Arc<dyn UnblockResolver>) -> Self {
        self.unblock = Some(unblock);
        self
    }

    /// Use a custom blob registry.
    pub fn with_blob_registry(mut self, blobs: Arc<dyn BlobRegistry>) -> Self {
        self.blobs = blobs;
        self
    }

    /// Mark the resolver as running in a restricted execution context.
    pub fn restricted(mut self, restricted: bool) -> Self {
        self.restricted_context = restricted;
        self
    }

    pub fn set_quality(&mut self, quality: SongQuality) {
        self.quality = quality;
    }

    /// Resolve a track to a playable URL.
    ///
    /// `Ok(None)` means every allowed source was exhausted; errors are
    /// transient failures worth retrying.
    pub async fn resolve(
        &self,
        track: &TrackDescriptor,
        allow_fallback: bool,
    ) -> Result<Option<String>> {
        match &track.source {
            TrackSource::Local { path, .. } => {
                // Missing local files count as source-unavailable, not I/O errors.
                if path.exists() {
                    Ok(Some(path.to_string_lossy().into_owned()))
                } else {
                    tracing::warn!("local file missing: {:?}", path);
                    Ok(None)
                }
            }
            TrackSource::Remote { id, .. } => {
                if let Some(url) = self.primary(*id).await? {
                    return Ok(Some(url));
                }
                if allow_fallback {
                    if let Some(unblock) = &self.unblock {
                        return self.fallback(unblock.as_ref(), track).await;
                    }
                }
                Ok(None)
            }
        }
    }

    /// Primary path: catalog song-URL API at the configured quality.
    async fn primary(&self, id: u64) -> Result<Option<String>> {
        let Some(candidate) = self.api.song_url(id, self.quality).await? else {
            return Ok(None);
        };
        if candidate.url.is_empty() {
            return Ok(None);
        }
        // Trial clips are useless in a restricted context; let the
        // fallback find the full track instead.
        if candidate.trial_only && self.restricted_context {
            tracing::info!("rejecting trial-only candidate for track {id}");
            return Ok(None);
        }
        Ok(Some(normalize_secure(&candidate.url)))
    }

    /// Fallback path: external unblock resolver, with blob wrapping for
    /// indirectly hosted media.
    async fn fallback(
        &self,
        unblock: &dyn UnblockResolver,
        track: &TrackDescriptor,
    ) -> Result<Option<String>> {
        tracing::info!("trying unblock fallback for {:?}", track.title);

        let Some(url) = unblock.resolve(track).await? else {
            return Ok(None);
        };

        if !unblock.is_indirect(&url) {
            return Ok(Some(url));
        }

        // Indirect host: fetch the raw bytes and wrap them locally.
        let encoded = unblock.fetch_blob(&url).await?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| crate::error::PlaybackError::Parse(format!("blob decode: {e}")))?;

        let uri = self.blobs.store(bytes);
        // Release the previous blob before replacing the reference.
        if let Some(previous) = self.last_blob.lock().replace(uri.clone()) {
            self.blobs.release(&previous);
        }
        Ok(Some(uri))
    }
}

/// Normalize a URL to secure transport.
fn normalize_secure(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("http:") {
        format!("https:{rest}")
    } else {
        url.to_string()
    }
}
