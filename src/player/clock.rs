/// Presentation clock of one player.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackClock {
    time: f64,
    duration: f64,
    first_frame: bool,
    seek_pending: bool,
}

/// What the end-of-media check did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOfMedia {
    /// Time is still inside the media.
    None,
    /// Time wrapped back to the start.
    Looped,
    /// Time was pinned to the duration.
    Ended,
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl PlaybackClock {
    pub fn new(duration: f64) -> Self {
        Self {
            time: 0.0,
            duration: duration.max(0.0),
            first_frame: true,
            seek_pending: false,
        }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn first_frame(&self) -> bool {
        self.first_frame
    }

    pub fn seek_pending(&self) -> bool {
        self.seek_pending
    }

    /// Adopt the duration of newly opened media, pulling time inside it.
    pub fn set_duration(&mut self, duration: f64) {
        self.duration = duration.max(0.0);
        self.time = self.time.min(self.duration);
    }

    /// Consume the one-shot first-frame flag. Returns whether it was set;
    /// a consumed first frame requests a resync.
    pub fn take_first_frame(&mut self) -> bool {
        let first = std::mem::take(&mut self.first_frame);
        if first {
            self.seek_pending = true;
        }
        first
    }

    pub fn advance(&mut self, dt: f64) {
        self.time += dt;
    }

    /// Wrap or pin time that reached the end of the media.
    pub fn check_end(&mut self, looping: bool) -> EndOfMedia {
        if self.time < self.duration {
            return EndOfMedia::None;
        }
        if looping && self.duration > 0.0 {
            self.time %= self.duration;
            self.seek_pending = true;
            EndOfMedia::Looped
        } else {
            self.time = self.duration;
            EndOfMedia::Ended
        }
    }

    /// Move to `time`, clamped to the media. Returns false when the clamped
    /// target equals the current time.
    pub fn seek(&mut self, time: f64) -> bool {
        let target = if time.is_nan() {
            0.0
        } else {
            time.clamp(0.0, self.duration)
        };
        if target == self.time {
            return false;
        }
        self.time = target;
        self.seek_pending = true;
        true
    }

    /// Back to the start, as if freshly constructed.
    pub fn rewind(&mut self) {
        self.time = 0.0;
        self.first_frame = true;
        self.seek_pending = true;
    }

    /// Clear the resync request. Returns whether one was pending.
    pub fn take_seek_pending(&mut self) -> bool {
        std::mem::take(&mut self.seek_pending)
    }
}

/// Next-sample positions into the video and audio tracks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursors {
    pub video: usize,
    pub audio: usize,
    /// The video cursor wrapped past the last sample since the last resync.
    pub video_exhausted: bool,
    pub audio_exhausted: bool,
}

impl Cursors {
    /// Step the video cursor, wrapping at `len`.
    pub fn advance_video(&mut self, len: usize) {
        self.video_exhausted |= step(&mut self.video, len);
    }

    pub fn advance_audio(&mut self, len: usize) {
        self.audio_exhausted |= step(&mut self.audio, len);
    }

    pub fn resync(&mut self, video: usize, audio: usize) {
        *self = Self {
            video,
            audio,
            video_exhausted: false,
            audio_exhausted: false,
        };
    }
}

/// Returns true on wrap.
fn step(cursor: &mut usize, len: usize) -> bool {
    *cursor += 1;
    if *cursor >= len {
        *cursor = 0;
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_frame_requests_resync() {
        let mut clock = PlaybackClock::new(5.0);
        assert!(clock.take_first_frame());
        assert!(clock.seek_pending());
        assert!(!clock.take_first_frame());
    }

    #[test]
    fn test_loop_wrap_lands_inside_dt() {
        let mut clock = PlaybackClock::new(5.0);
        clock.seek(4.99);
        clock.take_seek_pending();
        clock.advance(0.02);
        assert_eq!(clock.check_end(true), EndOfMedia::Looped);
        assert!((clock.time() - 0.01).abs() < 1e-9);
        assert!(clock.seek_pending());
    }

    #[test]
    fn test_end_pins_time() {
        let mut clock = PlaybackClock::new(2.0);
        clock.advance(7.5);
        assert_eq!(clock.check_end(false), EndOfMedia::Ended);
        assert_eq!(clock.time(), 2.0);
        assert_eq!(clock.check_end(false), EndOfMedia::Ended);
    }

    #[test]
    fn test_seek_clamps_and_dedups() {
        let mut clock = PlaybackClock::new(3.0);
        assert!(clock.seek(13.0));
        assert_eq!(clock.time(), 3.0);
        clock.take_seek_pending();
        assert!(!clock.seek(3.0));
        assert!(!clock.seek_pending());
        assert!(clock.seek(-1.0));
        assert_eq!(clock.time(), 0.0);
    }

    #[test]
    fn test_zero_duration_never_loops() {
        let mut clock = PlaybackClock::new(0.0);
        assert_eq!(clock.check_end(true), EndOfMedia::Ended);
        assert_eq!(clock.time(), 0.0);
    }

    #[test]
    fn test_cursor_wrap_marks_exhausted() {
        let mut cursors = Cursors::default();
        cursors.advance_video(2);
        assert!(!cursors.video_exhausted);
        cursors.advance_video(2);
        assert_eq!(cursors.video, 0);
        assert!(cursors.video_exhausted);
        cursors.resync(1, 3);
        assert!(!cursors.video_exhausted);
        assert_eq!(cursors.audio, 3);
    }
}
