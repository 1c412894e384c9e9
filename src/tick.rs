//! Per-tick inputs supplied by the embedding engine.

/// Time step handed to [`VideoPlayer::update`](crate::VideoPlayer::update).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickContext {
    /// Scaled delta time, seconds.
    pub delta: f64,
    /// Real delta time, seconds.
    pub unscaled_delta: f64,
    /// Whether the engine is in play mode. Outside play mode (editor
    /// preview) the unscaled delta drives playback.
    pub play_mode: bool,
}

impl TickContext {
    /// A play-mode tick whose scaled and unscaled deltas agree.
    pub fn new(delta: f64) -> Self {
        Self {
            delta,
            unscaled_delta: delta,
            play_mode: true,
        }
    }

    /// The delta playback should advance by. Negative or non-finite deltas
    /// count as zero.
    pub fn dt(&self) -> f64 {
        let dt = if self.play_mode {
            self.delta
        } else {
            self.unscaled_delta
        };
        if dt.is_finite() {
            dt.max(0.0)
        } else {
            0.0
        }
    }
}

/// World placement of a player, used for spatial audio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: [f32; 3],
    /// Quaternion, xyzw.
    pub orientation: [f32; 4],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            orientation: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl Transform {
    pub fn from_position(position: [f32; 3]) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dt_selects_by_play_mode() {
        let tick = TickContext {
            delta: 0.5,
            unscaled_delta: 0.016,
            play_mode: true,
        };
        assert_eq!(tick.dt(), 0.5);
        assert_eq!(TickContext { play_mode: false, ..tick }.dt(), 0.016);
        assert_eq!(TickContext::new(-1.0).dt(), 0.0);
        assert_eq!(TickContext::new(f64::NAN).dt(), 0.0);
    }
}
