mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = ["./vidcore.toml", "~/.config/vidcore/config.toml"];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Reject values no player can run with; log the ones that get clamped.
fn validate_config(config: &Config) -> Result<()> {
    let playback = &config.playback;
    if !(playback.tick_secs.is_finite() && playback.tick_secs > 0.0) {
        anyhow::bail!("playback.tick_secs must be positive, got {}", playback.tick_secs);
    }
    if !(playback.time_scale.is_finite() && playback.time_scale >= 0.0) {
        anyhow::bail!(
            "playback.time_scale must be non-negative, got {}",
            playback.time_scale
        );
    }
    if config.player.audio_ring_capacity == 0 {
        anyhow::bail!("player.audio_ring_capacity must be at least 1");
    }

    for warning in config.player.validate() {
        tracing::warn!("player config: {}", warning);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = PlayerConfig::default();
        assert!(!config.looping);
        assert!(!config.is_spatial);
        assert_eq!(config.volume, 1.0);
        assert_eq!(config.pan, 0.0);
        assert_eq!(config.min_distance, 1000.0);
        assert_eq!(config.attenuation, 1.0);
        assert_eq!(config.audio_ring_capacity, 30);
        assert!((Config::default().playback.tick_secs - 1.0 / 60.0).abs() < 1e-12);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: Config = toml::from_str(
            r#"
[player]
url = "clip.mp4"
loop = true
volume = 0.5

[playback]
tick_secs = 0.04
"#,
        )
        .unwrap();
        assert_eq!(config.player.url, "clip.mp4");
        assert!(config.player.looping);
        assert_eq!(config.player.volume, 0.5);
        assert_eq!(config.player.min_distance, 1000.0);
        assert_eq!(config.playback.tick_secs, 0.04);
        assert!(config.playback.play_mode);
    }

    #[test]
    fn test_clamped() {
        let config = PlayerConfig {
            volume: 3.0,
            pan: f32::NAN,
            min_distance: -5.0,
            start_time: -1.0,
            audio_ring_capacity: 0,
            ..PlayerConfig::default()
        };
        assert_eq!(config.validate().len(), 5);
        let clamped = config.clamped();
        assert_eq!(clamped.volume, 1.0);
        assert_eq!(clamped.pan, 0.0);
        assert_eq!(clamped.min_distance, 0.0);
        assert_eq!(clamped.start_time, 0.0);
        assert_eq!(clamped.audio_ring_capacity, 1);
    }

    #[test]
    fn test_load_rejects_bad_tick() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[playback]\ntick_secs = 0.0").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("tick_secs"));
    }

    #[test]
    fn test_load_custom_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[player]\nurl = \"a.mp4\"\naudio_ring_capacity = 8").unwrap();
        let config = load_config_or_default(Some(file.path())).unwrap();
        assert_eq!(config.player.audio_ring_capacity, 8);
    }
}
