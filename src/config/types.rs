use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub player: PlayerConfig,

    #[serde(default)]
    pub playback: PlaybackConfig,
}

/// Per-player settings. Audio parameters are clamped when applied.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PlayerConfig {
    /// Media location: a `file://` url or a filesystem path.
    #[serde(default)]
    pub url: String,

    /// Jump back to the start at the end of the media instead of pausing.
    #[serde(default, rename = "loop")]
    pub looping: bool,

    /// Audio follows the player's world transform and attenuates with distance.
    #[serde(default)]
    pub is_spatial: bool,

    /// 0.0 to 1.0
    #[serde(default = "default_volume")]
    pub volume: f32,

    /// -1.0 (left) to 1.0 (right); ignored when spatial.
    #[serde(default)]
    pub pan: f32,

    /// Distance below which no attenuation applies.
    #[serde(default = "default_min_distance")]
    pub min_distance: f32,

    /// Fall-off rate beyond `min_distance`.
    #[serde(default = "default_attenuation")]
    pub attenuation: f32,

    #[serde(default)]
    pub play_on_start: bool,

    /// Seconds; applied by `begin_play`.
    #[serde(default)]
    pub start_time: f64,

    /// Number of PCM buffers cycled through the audio source.
    #[serde(default = "default_audio_ring_capacity")]
    pub audio_ring_capacity: usize,
}

fn default_volume() -> f32 {
    1.0
}

fn default_min_distance() -> f32 {
    1000.0
}

fn default_attenuation() -> f32 {
    1.0
}

fn default_audio_ring_capacity() -> usize {
    30
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            looping: false,
            is_spatial: false,
            volume: default_volume(),
            pan: 0.0,
            min_distance: default_min_distance(),
            attenuation: default_attenuation(),
            play_on_start: false,
            start_time: 0.0,
            audio_ring_capacity: default_audio_ring_capacity(),
        }
    }
}

impl PlayerConfig {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Describe every value that will be clamped or ignored.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.url.is_empty() {
            warnings.push("url is empty; play will fail".to_string());
        }
        if !(0.0..=1.0).contains(&self.volume) {
            warnings.push(format!("volume {} clamped to [0, 1]", self.volume));
        }
        if !(-1.0..=1.0).contains(&self.pan) {
            warnings.push(format!("pan {} clamped to [-1, 1]", self.pan));
        }
        if self.is_spatial && self.pan != 0.0 {
            warnings.push("pan is ignored for spatial audio".to_string());
        }
        if self.min_distance < 0.0 {
            warnings.push(format!("min_distance {} raised to 0", self.min_distance));
        }
        if self.attenuation < 0.0 {
            warnings.push(format!("attenuation {} raised to 0", self.attenuation));
        }
        if self.start_time < 0.0 {
            warnings.push(format!("start_time {} raised to 0", self.start_time));
        }
        warnings
    }

    /// Copy with every numeric field moved into its valid range.
    pub fn clamped(&self) -> Self {
        Self {
            volume: clamp_or(self.volume, 0.0, 1.0, default_volume()),
            pan: clamp_or(self.pan, -1.0, 1.0, 0.0),
            min_distance: clamp_or(self.min_distance, 0.0, f32::MAX, default_min_distance()),
            attenuation: clamp_or(self.attenuation, 0.0, f32::MAX, default_attenuation()),
            start_time: if self.start_time.is_finite() {
                self.start_time.max(0.0)
            } else {
                0.0
            },
            audio_ring_capacity: self.audio_ring_capacity.max(1),
            ..self.clone()
        }
    }
}

/// Clamp into `[min, max]`; NaN falls back to `fallback`.
pub fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

/// Settings for driving players outside an engine (the `simulate` command).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PlaybackConfig {
    /// Simulated tick length in seconds.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: f64,

    /// Use the scaled delta. When false the unscaled delta drives playback,
    /// as in an editor preview.
    #[serde(default = "default_play_mode")]
    pub play_mode: bool,

    /// Time scale applied to the scaled delta.
    #[serde(default = "default_time_scale")]
    pub time_scale: f64,

    /// Worker threads for ticking players; 0 uses one per CPU.
    #[serde(default)]
    pub threads: usize,
}

fn default_tick_secs() -> f64 {
    1.0 / 60.0
}

fn default_play_mode() -> bool {
    true
}

fn default_time_scale() -> f64 {
    1.0
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            play_mode: default_play_mode(),
            time_scale: default_time_scale(),
            threads: 0,
        }
    }
}
