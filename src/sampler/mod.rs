//! Progress sampling.
//!
//! Two sampling cadences run while a session is active:
//!
//! - a coarse 250ms tick that rebuilds the full [`ProgressSnapshot`]
//!   (formatted times, fraction played, active lyric line) and reports
//!   fraction-played to the taskbar, and
//! - a fine ~17ms tick that publishes only the raw engine position for
//!   consumers that need frame-rate smoothness (word-synced lyric
//!   rendering).
//!
//! Both publish into a [`ProgressShared`] the embedder polls; the sampler
//! never pushes events.

use crate::engine::SoundEngine;
use crate::lyrics::{LyricTrack, active_line_index};
use crate::model::{ProgressSnapshot, format_duration};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Coarse snapshot cadence.
pub const COARSE_TICK: Duration = Duration::from_millis(250);

/// Fine raw-position cadence (~60Hz).
pub const FINE_TICK: Duration = Duration::from_millis(17);

/// Shared progress state written by the sampler, read by the embedder.
#[derive(Default)]
pub struct ProgressShared {
    snapshot: RwLock<ProgressSnapshot>,
    raw_position_ms: AtomicU64,
}

impl ProgressShared {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest coarse snapshot.
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot.read().clone()
    }

    /// Latest fine-grained position.
    pub fn raw_position(&self) -> Duration {
        Duration::from_millis(self.raw_position_ms.load(Ordering::Relaxed))
    }

    /// Reset to the zero state (session torn down).
    pub fn reset(&self) {
        *self.snapshot.write() = ProgressSnapshot::default();
        self.raw_position_ms.store(0, Ordering::Relaxed);
    }

    fn publish(&self, snapshot: ProgressSnapshot) {
        *self.snapshot.write() = snapshot;
    }

    fn publish_raw(&self, position: Duration) {
        self.raw_position_ms
            .store(position.as_millis() as u64, Ordering::Relaxed);
    }
}

/// OS taskbar progress indicator.
pub trait TaskbarProgress: Send + Sync {
    /// Report fraction played as a 0-100 percentage.
    fn set_progress(&self, percent: f64);

    /// Remove the progress indicator.
    fn clear(&self);
}

/// Drives the coarse and fine sampling tasks for one session.
#[derive(Default)]
pub struct ProgressSampler {
    coarse: Option<JoinHandle<()>>,
    fine: Option<JoinHandle<()>>,
}

impl ProgressSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.coarse.is_some()
    }

    /// Start sampling against an engine. Any previous sampling tasks are
    /// stopped first, so starting twice is safe.
    pub fn start(
        &mut self,
        engine: Arc<dyn SoundEngine>,
        lyrics: Arc<LyricTrack>,
        prefer_word_sync: bool,
        shared: Arc<ProgressShared>,
        taskbar: Option<Arc<dyn TaskbarProgress>>,
    ) {
        self.stop();

        let coarse_engine = engine.clone();
        let coarse_shared = shared.clone();
        self.coarse = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(COARSE_TICK);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let snapshot = build_snapshot(
                    coarse_engine.as_ref(),
                    &lyrics,
                    prefer_word_sync,
                );
                if let Some(taskbar) = &taskbar {
                    if snapshot.duration > Duration::ZERO {
                        taskbar.set_progress(snapshot.percent_played());
                    }
                }
                coarse_shared.publish(snapshot);
            }
        }));

        self.fine = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(FINE_TICK);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                shared.publish_raw(engine.position());
            }
        }));
    }

    /// Stop both sampling tasks.
    pub fn stop(&mut self) {
        if let Some(task) = self.coarse.take() {
            task.abort();
        }
        if let Some(task) = self.fine.take() {
            task.abort();
        }
    }
}

impl Drop for ProgressSampler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn build_snapshot(
    engine: &dyn SoundEngine,
    lyrics: &LyricTrack,
    prefer_word_sync: bool,
) -> ProgressSnapshot {
    let current_time = engine.position();
    let duration = engine.duration().unwrap_or(Duration::ZERO);
    let fraction_played = if duration > Duration::ZERO {
        (current_time.as_secs_f64() / duration.as_secs_f64()).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let active_lyric_line =
        active_line_index(lyrics.active_lines(prefer_word_sync), current_time);
    ProgressSnapshot {
        current_time,
        duration,
        fraction_played,
        formatted_elapsed: format_duration(current_time),
        formatted_duration: format_duration(duration),
        active_lyric_line,
    }
}
