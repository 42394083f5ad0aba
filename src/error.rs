//! Playback error taxonomy.
//!
//! Errors fall into two buckets: failures that count against the retry
//! ceiling during playback initialization (network, decode) and failures
//! that steer the queue instead (no playable source). Only
//! [`PlaybackError::FatalInitLoop`] halts auto-advance entirely; it is
//! raised once the consecutive-failure ceiling is exceeded and requires an
//! explicit user acknowledgment to clear.

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, PlaybackError>;

/// Top-level playback error.
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    /// No playable URL from any source (primary or fallback), or a local
    /// file is missing. Routed to queue advance rather than retry.
    #[error("no playable source")]
    SourceUnavailable,

    /// The engine reported unsupported or corrupt media.
    #[error("media decode failed: {0}")]
    Decode(String),

    /// The user agent cancelled a fetch in flight.
    #[error("media fetch aborted")]
    AbortedFetch,

    /// Retryable network failure, counted against the retry ceiling.
    #[error("network error: {0}")]
    TransientNetwork(String),

    /// Consecutive initialization failures exceeded the ceiling; playback
    /// halts until the user explicitly acknowledges and reloads.
    #[error("playback initialization failed too many times")]
    FatalInitLoop,

    /// The queue holds nothing playable.
    #[error("no playable tracks in queue")]
    NoPlayableTracks,

    /// Sound engine failure that does not fit a more specific variant.
    #[error("sound engine error: {0}")]
    Engine(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed payload from a remote API.
    #[error("parse error: {0}")]
    Parse(String),
}

impl PlaybackError {
    /// Map an engine load-error code to the taxonomy.
    ///
    /// Codes follow the media-element convention the engine reports:
    /// 1 = fetch aborted by the user agent, 2 = network error after the
    /// resource was determined available, 3 = decode error, 4 = media not
    /// suitable / unsupported format.
    pub fn from_load_error(code: u32) -> Self {
        match code {
            1 => Self::AbortedFetch,
            2 => Self::TransientNetwork("media fetch interrupted".to_string()),
            3 => Self::Decode("error while decoding media".to_string()),
            4 => Self::Decode("unsupported audio format".to_string()),
            other => Self::Engine(format!("load failed with code {other}")),
        }
    }

    /// Create an engine error.
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine(message.into())
    }

    /// Create a transient network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::TransientNetwork(message.into())
    }

    /// Whether this failure halts auto-advance entirely.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalInitLoop)
    }
}
