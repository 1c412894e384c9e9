//! Headless playback on the null backends.
//!
//! Drives one player through a [`VideoSystem`] the way an engine would:
//! tick the system, flush queued upload tasks on the "render thread", and
//! let the fake audio device drain buffers at the stream's real rate.

use crate::backend::null::{NullAudio, NullCodecs, NullGpu};
use crate::backend::{Backends, PictureFormat};
use crate::config::Config;
use crate::error::{PlayerError, Result};
use crate::player::PlayerState;
use crate::stats::PlayerStats;
use crate::system::{PlayerId, VideoSystem};
use crate::tick::TickContext;
use crate::upload::QueuedUploadRuntime;
use serde::Serialize;
use std::sync::Arc;
use vidcore_media::Demuxer;

/// PCM frames per decoded buffer produced by the null AAC decoder.
const AUDIO_FRAMES_PER_BUFFER: f64 = 1024.0;

/// Player state observed at one point of a simulation.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationSample {
    /// Simulated wall-clock seconds since start.
    pub elapsed: f64,
    pub state: PlayerState,
    pub time: f64,
    pub frames: u64,
    pub queued_audio: usize,
    pub stats: PlayerStats,
}

pub struct Simulation {
    system: VideoSystem,
    player: PlayerId,
    gpu: Arc<NullGpu>,
    uploads: Arc<QueuedUploadRuntime>,
    audio: Arc<NullAudio>,
    tick: TickContext,
    /// Seconds of one decoded audio buffer, 0 without audio.
    audio_buffer_secs: f64,
    audio_backlog: f64,
    elapsed: f64,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("player", &self.player)
            .field("elapsed", &self.elapsed)
            .finish_non_exhaustive()
    }
}

impl Simulation {
    /// Open `url` and start playing it with the settings in `config`.
    pub fn start(config: &Config, url: &str) -> Result<Self> {
        // The null decoders need the coded size up front.
        let demuxer = Demuxer::open(url).map_err(|e| PlayerError::from_media(url, e))?;
        let index = demuxer.index();
        let codecs = NullCodecs::new(PictureFormat::I420, index.width(), index.height());
        let audio_buffer_secs = index
            .audio_info
            .as_ref()
            .map(|a| a.format.sample_rate)
            .filter(|rate| *rate > 0)
            .map_or(0.0, |rate| AUDIO_FRAMES_PER_BUFFER / rate as f64);
        drop(demuxer);

        let gpu = Arc::new(NullGpu::new());
        let uploads = Arc::new(QueuedUploadRuntime::new());
        let audio = Arc::new(NullAudio::new());
        let backends = Backends {
            gpu: gpu.clone(),
            uploads: uploads.clone(),
            audio: audio.clone(),
            codecs: Arc::new(codecs),
        };

        let mut system = match VideoSystem::with_threads(backends.clone(), config.playback.threads) {
            Ok(system) => system,
            Err(e) => {
                tracing::warn!(error = %e, "Falling back to the global tick pool");
                VideoSystem::new(backends)
            }
        };

        let mut player_config = config.player.clone();
        player_config.url = url.to_string();
        let player = system.add(player_config);
        if let Some(p) = system.get_mut(player) {
            p.play()?;
        }

        let playback = &config.playback;
        let tick = TickContext {
            delta: playback.tick_secs * playback.time_scale,
            unscaled_delta: playback.tick_secs,
            play_mode: playback.play_mode,
        };

        Ok(Self {
            system,
            player,
            gpu,
            uploads,
            audio,
            tick,
            audio_buffer_secs,
            audio_backlog: 0.0,
            elapsed: 0.0,
        })
    }

    /// Advance one tick.
    pub fn step(&mut self) {
        self.system.update(&self.tick);
        self.uploads.flush(self.gpu.as_ref());

        if self.audio_buffer_secs > 0.0 {
            self.audio_backlog += self.tick.dt();
            let due = (self.audio_backlog / self.audio_buffer_secs) as usize;
            if due > 0 {
                self.audio.consume_playing(due);
                self.audio_backlog -= due as f64 * self.audio_buffer_secs;
            }
        }
        self.elapsed += self.tick.unscaled_delta;
    }

    /// Run for `seconds` of simulated wall time, sampling once per second.
    pub fn run(&mut self, seconds: f64) -> Vec<SimulationSample> {
        let mut samples = Vec::new();
        let mut next_report = 1.0;
        let ticks = if self.tick.unscaled_delta > 0.0 {
            (seconds / self.tick.unscaled_delta).round() as u64
        } else {
            0
        };

        for _ in 0..ticks {
            self.step();
            if self.elapsed + 1e-9 >= next_report {
                samples.extend(self.sample());
                next_report += 1.0;
            }
        }
        samples
    }

    pub fn sample(&self) -> Option<SimulationSample> {
        let player = self.system.get(self.player)?;
        let queued_audio = player
            .audio_source()
            .and_then(|s| self.audio.snapshot(s))
            .map_or(0, |s| s.queued);
        Some(SimulationSample {
            elapsed: self.elapsed,
            state: player.state(),
            time: player.time(),
            frames: player.frames_count(),
            queued_audio,
            stats: player.stats(),
        })
    }

    pub fn system_mut(&mut self) -> &mut VideoSystem {
        &mut self.system
    }

    pub fn player(&self) -> PlayerId {
        self.player
    }

    pub fn gpu(&self) -> &NullGpu {
        &self.gpu
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidcore_media::fixture::{AudioTrackSpec, Mp4Builder, VideoTrackSpec};

    #[test]
    fn test_simulation_plays_and_reports_each_second() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        Mp4Builder::new()
            .video(VideoTrackSpec::new(32, 16, 30, 90))
            .audio(AudioTrackSpec::new(48000, 2, 141))
            .write_to(&path)
            .unwrap();

        let mut config = Config::default();
        config.playback.threads = 1;
        let mut sim = Simulation::start(&config, path.to_str().unwrap()).unwrap();
        let samples = sim.run(2.0);

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].state, PlayerState::Playing);
        assert!(samples[0].frames > 0);
        assert!(samples[1].frames > samples[0].frames);
        assert!(samples[1].time > samples[0].time);
        assert!(samples[1].queued_audio <= config.player.audio_ring_capacity);
        assert!(sim.gpu().draws() > 0);
    }

    #[test]
    fn test_simulation_missing_file() {
        let err = Simulation::start(&Config::default(), "/nonexistent/clip.mp4").unwrap_err();
        assert!(err.is_open_failure());
    }
}
