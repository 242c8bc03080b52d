//! Playback session state: the state machine, mode policy, and the
//! elapsed-time estimate. Pure logic, no process handling.

use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use rand::Rng;

use crate::library::track::Track;

/// Playback state machine:
/// `Idle -> Loading -> Playing <-> Paused -> Idle`, with a direct
/// `Loading -> Idle` edge on load failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayState {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
}

/// Track-advancement policy, cycled in a fixed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackMode {
    #[default]
    Sequential,
    RepeatOne,
    Shuffle,
}

impl PlaybackMode {
    pub fn next(self) -> Self {
        match self {
            Self::Sequential => Self::RepeatOne,
            Self::RepeatOne => Self::Shuffle,
            Self::Shuffle => Self::Sequential,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Sequential => "→",
            Self::RepeatOne => "🔂",
            Self::Shuffle => "🔀",
        }
    }
}

/// The single mutable playback context owned by the controller.
///
/// Holds the active source sequence (a playlist or a transient single-track
/// queue), a cursor into it, and the advisory elapsed-time estimate derived
/// from wall-clock time minus accumulated paused time.
#[derive(Debug, Default)]
pub struct PlaybackSession {
    state: PlayState,
    mode: PlaybackMode,
    queue: Vec<Track>,
    cursor: usize,
    /// Indices not yet played in the current shuffle cycle.
    shuffle_pool: Vec<usize>,
    started_at: Option<Instant>,
    paused_at: Option<Instant>,
    paused_total: Duration,
    /// Seconds already consumed before the current launch (seek offset).
    start_offset: u32,
}

impl PlaybackSession {
    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    pub fn cycle_mode(&mut self) -> PlaybackMode {
        self.mode = self.mode.next();
        self.mode
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> Option<&Track> {
        if self.state == PlayState::Idle {
            return None;
        }
        self.queue.get(self.cursor)
    }

    /// Track under the cursor regardless of state.
    pub fn peek(&self) -> Option<&Track> {
        self.queue.get(self.cursor)
    }

    /// Install a new active sequence and position the cursor.
    pub fn set_queue(&mut self, tracks: Vec<Track>, start: usize) {
        self.cursor = start.min(tracks.len().saturating_sub(1));
        self.queue = tracks;
        self.reset_shuffle_cycle();
    }

    /// Enter `Loading` for the track under the cursor.
    pub fn begin_loading(&mut self, start_offset: u32) {
        self.state = PlayState::Loading;
        self.start_offset = start_offset;
        self.started_at = None;
        self.paused_at = None;
        self.paused_total = Duration::ZERO;
    }

    /// The backend reported the process is up.
    pub fn mark_playing(&mut self) {
        self.state = PlayState::Playing;
        self.started_at = Some(Instant::now());
        // This index has now been played within the current shuffle cycle.
        self.shuffle_pool.retain(|&i| i != self.cursor);
    }

    pub fn mark_paused(&mut self) {
        if self.state == PlayState::Playing {
            self.state = PlayState::Paused;
            self.paused_at = Some(Instant::now());
        }
    }

    pub fn mark_resumed(&mut self) {
        if self.state == PlayState::Paused {
            self.state = PlayState::Playing;
            if let Some(paused_at) = self.paused_at.take() {
                self.paused_total += paused_at.elapsed();
            }
        }
    }

    /// Back to `Idle`: stop, natural end with nothing next, or failure.
    pub fn mark_idle(&mut self) {
        self.state = PlayState::Idle;
        self.started_at = None;
        self.paused_at = None;
        self.paused_total = Duration::ZERO;
        self.start_offset = 0;
    }

    /// Advisory elapsed seconds. Never exceeds the track duration and never
    /// decreases within one launch.
    pub fn elapsed(&self) -> u32 {
        let Some(started_at) = self.started_at else {
            return self.start_offset;
        };

        let mut active = match self.paused_at {
            // Frozen while paused.
            Some(paused_at) => paused_at.duration_since(started_at),
            None => started_at.elapsed(),
        };
        active = active.saturating_sub(self.paused_total);

        let elapsed = self.start_offset + active.as_secs() as u32;
        match self.duration() {
            Some(duration) => elapsed.min(duration),
            None => elapsed,
        }
    }

    pub fn duration(&self) -> Option<u32> {
        self.queue.get(self.cursor).and_then(|t| t.duration)
    }

    /// Clamp a seek to `[0, duration]` and return the new offset.
    pub fn clamp_seek(&self, delta: i64) -> u32 {
        let target = self.elapsed() as i64 + delta;
        let target = target.max(0) as u32;
        match self.duration() {
            Some(duration) => target.min(duration),
            None => target,
        }
    }

    /// Apply the playback mode to choose the next track after natural
    /// completion (or a manual `next`). Returns the track to play, or `None`
    /// when the sequence is exhausted.
    pub fn advance(&mut self) -> Option<Track> {
        if self.queue.is_empty() {
            return None;
        }

        match self.mode {
            PlaybackMode::Sequential => {
                if self.cursor + 1 < self.queue.len() {
                    self.cursor += 1;
                    self.queue.get(self.cursor).cloned()
                } else {
                    None
                }
            }
            PlaybackMode::RepeatOne => self.queue.get(self.cursor).cloned(),
            PlaybackMode::Shuffle => {
                if self.shuffle_pool.is_empty() {
                    // Cycle exhausted: every track has played once; reshuffle.
                    self.reset_shuffle_cycle();
                }
                let pick = rand::thread_rng().gen_range(0..self.shuffle_pool.len());
                self.cursor = self.shuffle_pool[pick];
                self.queue.get(self.cursor).cloned()
            }
        }
    }

    /// Manual previous-track. At the first position the current track simply
    /// restarts (no wraparound).
    pub fn previous(&mut self) -> Option<Track> {
        if self.queue.is_empty() {
            return None;
        }
        if self.cursor > 0 {
            self.cursor -= 1;
        }
        self.queue.get(self.cursor).cloned()
    }

    fn reset_shuffle_cycle(&mut self) {
        self.shuffle_pool = (0..self.queue.len()).collect();
        self.shuffle_pool.shuffle(&mut rand::thread_rng());
    }
}
