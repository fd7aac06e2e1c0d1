//! Playback state for a hosted movie.
//!
//! The clock is computed, not ticked: no background task advances frames.
//! While playing, the current frame is derived from the wall-clock time
//! since play started; readers (the frame SSE stream, the export loop)
//! sample it on their own schedule.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct PlaybackState {
    fps: u32,
    total_frames: u32,
    /// Frame position when paused, or the origin frame while playing.
    base_frame: u32,
    started_at: Option<Instant>,
}

impl PlaybackState {
    #[must_use]
    pub fn new(fps: u32, total_frames: u32) -> Self {
        Self {
            fps: fps.max(1),
            total_frames: total_frames.max(1),
            base_frame: 0,
            started_at: None,
        }
    }

    #[must_use]
    pub const fn is_playing(&self) -> bool {
        self.started_at.is_some()
    }

    #[must_use]
    pub const fn fps(&self) -> u32 {
        self.fps
    }

    #[must_use]
    pub const fn total_frames(&self) -> u32 {
        self.total_frames
    }

    /// Idempotent: playing while already playing keeps the current clock.
    pub fn play(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
    }

    /// Idempotent: freezes the derived frame as the new base position.
    pub fn pause(&mut self) {
        if let Some(started_at) = self.started_at.take() {
            self.base_frame = self.frame_after(started_at.elapsed());
        }
    }

    /// Jumps to `frame`, clamped to the valid range. Playback state is
    /// preserved: a playing movie keeps playing from the new position.
    pub fn seek(&mut self, frame: u32) {
        self.base_frame = frame.min(self.total_frames - 1);
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
    }

    #[must_use]
    pub fn current_frame(&self) -> u32 {
        match self.started_at {
            Some(started_at) => self.frame_after(started_at.elapsed()),
            None => self.base_frame,
        }
    }

    fn frame_after(&self, elapsed: Duration) -> u32 {
        let advanced = elapsed.as_millis() * u128::from(self.fps) / 1000;
        let frame = u128::from(self.base_frame) + advanced;
        (frame % u128::from(self.total_frames)) as u32
    }
}
