//! Queue position and advance rules.
//!
//! [`QueueState`] owns the ordered track list, the current index, the play
//! mode, and the one-shot insert-next override. It decides WHERE playback
//! moves; actually loading and starting the target is the controller's
//! job.

use crate::model::{PlayMode, TrackDescriptor};
use rand::Rng;

/// Direction of a user-initiated skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
}

/// Result of an advance decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Move to the track at this index
    Moved(usize),
    /// Stay on the current track and restart it
    RepeatCurrent,
}

/// Ordered track list plus position and mode.
#[derive(Debug, Clone, Default)]
pub struct QueueState {
    tracks: Vec<TrackDescriptor>,
    index: usize,
    mode: PlayMode,
    /// Set by [`insert_next`](Self::insert_next); the next advance steps
    /// by direction regardless of mode, then the flag clears.
    insert_next_override: bool,
}

impl QueueState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tracks(tracks: Vec<TrackDescriptor>) -> Self {
        Self {
            tracks,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn mode(&self) -> PlayMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: PlayMode) {
        self.mode = mode;
    }

    pub fn tracks(&self) -> &[TrackDescriptor] {
        &self.tracks
    }

    /// The track at the current index.
    pub fn current(&self) -> Option<&TrackDescriptor> {
        self.tracks.get(self.index)
    }

    /// Replace the whole queue, clamping the index into range.
    pub fn replace(&mut self, tracks: Vec<TrackDescriptor>, index: usize) {
        self.index = if tracks.is_empty() {
            0
        } else {
            index.min(tracks.len() - 1)
        };
        self.tracks = tracks;
        self.insert_next_override = false;
    }

    /// Jump directly to an index. Out-of-range requests are ignored.
    pub fn jump_to(&mut self, index: usize) -> bool {
        if index < self.tracks.len() {
            self.index = index;
            true
        } else {
            false
        }
    }

    /// Append a track at the end (radio feeds grow the queue this way).
    pub fn push(&mut self, track: TrackDescriptor) {
        self.tracks.push(track);
    }

    /// Decide the advance target, for a user-initiated skip and for a
    /// track ending naturally alike.
    ///
    /// An armed insert-next override wins over mode policy: the flag
    /// clears and the index steps by direction. Repeat-one never moves the
    /// index; every advance replays the current track. Returns `None` only
    /// when the queue is empty; the index always stays in `0..len`.
    pub fn step(&mut self, direction: Direction) -> Option<AdvanceOutcome> {
        if self.tracks.is_empty() {
            return None;
        }

        if self.insert_next_override {
            self.insert_next_override = false;
            self.index = self.shifted(direction);
            return Some(AdvanceOutcome::Moved(self.index));
        }

        self.index = match (self.mode, direction) {
            (PlayMode::RepeatOne, _) => return Some(AdvanceOutcome::RepeatCurrent),
            (PlayMode::Random, _) => {
                if self.tracks.len() == 1 {
                    0
                } else {
                    rand::rng().random_range(0..self.tracks.len())
                }
            }
            (_, _) => self.shifted(direction),
        };
        Some(AdvanceOutcome::Moved(self.index))
    }

    /// Index one step away, wrapping modulo the queue length.
    fn shifted(&self, direction: Direction) -> usize {
        match direction {
            Direction::Next => (self.index + 1) % self.tracks.len(),
            Direction::Prev => (self.index + self.tracks.len() - 1) % self.tracks.len(),
        }
    }

    /// Insert a track to play right after the current one.
    ///
    /// If the track is already queued it is relocated rather than
    /// duplicated. Returns the index it ends up at. Always arms the
    /// insert-next override so the following advance reaches it even in
    /// random mode.
    pub fn insert_next(&mut self, track: TrackDescriptor) -> usize {
        if let Some(existing) = self.tracks.iter().position(|t| t.same_track(&track)) {
            if existing != self.index {
                let moved = self.tracks.remove(existing);
                // Removing an earlier entry shifts the current index left.
                if existing < self.index {
                    self.index -= 1;
                }
                let target = (self.index + 1).min(self.tracks.len());
                self.tracks.insert(target, moved);
                self.insert_next_override = true;
                return target;
            }
            self.insert_next_override = true;
            return existing;
        }

        let target = if self.tracks.is_empty() {
            0
        } else {
            self.index + 1
        };
        self.tracks.insert(target, track);
        self.insert_next_override = true;
        target
    }

    #[cfg(test)]
    pub(crate) fn override_armed(&self) -> bool {
        self.insert_next_override
    }
}
