//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\tunedeck\config.toml
//! - macOS: ~/Library/Application Support/tunedeck/config.toml
//! - Linux: ~/.config/tunedeck/config.toml
//!
//! The config file is human-readable and editable. Settings are loaded at
//! startup and saved when changed. Playback state that must survive a
//! restart (play mode, queue index, resume position) lives in the `state`
//! section.

use crate::model::PlayMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Volume applied when nothing else is known (fresh install, unmute with
/// no stored pre-mute level).
pub const DEFAULT_VOLUME: f32 = 0.7;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Playback preferences
    pub playback: PlaybackConfig,

    /// Source resolution preferences
    pub sources: SourceConfig,

    /// OS integration settings
    pub integration: IntegrationConfig,

    /// Failure policy
    pub policy: FailurePolicy,

    /// Persisted playback state
    pub state: SavedState,
}

/// Playback preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Last volume level (0.0 - 1.0)
    pub volume: f32,

    /// Playback rate multiplier
    pub rate: f32,

    /// Whether play/pause transitions fade (300ms ramp) or cut
    pub fade_enabled: bool,

    /// Resume near the last position when a track reloads
    pub memory_seek: bool,

    /// Prefer the word-synced lyric variant for the active-line index
    pub word_synced_lyrics: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            volume: DEFAULT_VOLUME,
            rate: 1.0,
            fade_enabled: true,
            memory_seek: true,
            word_synced_lyrics: true,
        }
    }
}

/// Streaming quality tier requested from the song-URL API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SongQuality {
    Standard,
    Higher,
    #[default]
    Exhigh,
    Lossless,
}

impl SongQuality {
    /// Quality level string understood by the remote API.
    pub fn api_level(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Higher => "higher",
            Self::Exhigh => "exhigh",
            Self::Lossless => "lossless",
        }
    }
}

/// Source resolution preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Requested streaming quality tier
    pub quality: SongQuality,

    /// Allow the unblock fallback resolver when the primary source
    /// yields nothing
    pub use_unblock: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            quality: SongQuality::default(),
            use_unblock: false,
        }
    }
}

/// OS integration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationConfig {
    /// Report fraction-played to the taskbar progress indicator
    pub taskbar_progress: bool,

    /// Register OS media-key handlers
    pub media_keys: bool,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            taskbar_progress: true,
            media_keys: true,
        }
    }
}

/// What to do when playback initialization fails non-fatally.
///
/// The upstream behavior is to stay on the failing track (retry is left to
/// the user); advancing automatically is available as an opt-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FailurePolicy {
    /// Advance to the next queue entry after a non-fatal init failure
    pub advance_on_init_failure: bool,

    /// Scrobble remote tracks after 5 seconds of playback
    pub scrobble: bool,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            advance_on_init_failure: false,
            scrobble: true,
        }
    }
}

/// Persisted playback state restored on startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SavedState {
    /// Play mode in effect when the app last ran
    pub play_mode: PlayMode,

    /// Queue index of the current track
    pub queue_index: usize,

    /// Position (seconds) to resume from when memory-seek is enabled
    pub resume_position_secs: Option<f64>,
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tunedeck"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from disk
///
/// Returns default config if file doesn't exist or can't be parsed.
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        tracing::warn!("Could not determine config directory, using defaults");
        return Config::default();
    };

    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!("Failed to parse config file {:?}: {}", path, e);
                tracing::warn!("Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file {:?}: {}", path, e);
            Config::default()
        }
    }
}

/// Save configuration to disk
///
/// Creates the config directory if it doesn't exist.
pub fn save(config: &Config) -> Result<(), ConfigError> {
    let dir = config_dir().ok_or(ConfigError::NoConfigDir)?;
    let path = dir.join("config.toml");

    // Ensure directory exists
    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::CreateDir(dir.clone(), e))?;

    // Serialize to pretty TOML
    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    // Write atomically (write to temp, then rename)
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, &path)
        .map_err(|e| ConfigError::Rename(temp_path, path.clone(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================
