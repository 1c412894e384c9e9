mod cli;

use vidcore::{config, report::MediaReport, simulate::Simulation};
use vidcore_media::{Demuxer, TrackIndex};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, TrackArg};
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "vidcore=trace,vidcore_media=trace".to_string()
        } else {
            "vidcore=debug,vidcore_media=debug".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Probe { file, json } => probe_file(&file, json),
        Commands::Samples { file, track, limit } => list_samples(&file, track, limit),
        Commands::Simulate {
            file,
            seconds,
            looping,
            json,
        } => simulate(&file, cli.config.as_deref(), seconds, looping, json),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("vidcore {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn open_file(file: &Path) -> Result<Demuxer> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }
    let url = file.to_string_lossy();
    Demuxer::open(&url).with_context(|| format!("Failed to open {}", url))
}

fn probe_file(file: &Path, json: bool) -> Result<()> {
    let demuxer = open_file(file)?;
    let report = MediaReport::new(file.to_string_lossy(), demuxer.index());

    if json {
        let json_str = serde_json::to_string_pretty(&report)?;
        println!("{}", json_str);
    } else {
        print!("{}", report.render());
    }

    Ok(())
}

fn list_samples(file: &Path, track: TrackArg, limit: usize) -> Result<()> {
    let demuxer = open_file(file)?;
    let index = demuxer.index();
    let track: &TrackIndex = match track {
        TrackArg::Video => index
            .video
            .as_ref()
            .context("Media has no playable video track")?,
        TrackArg::Audio => index
            .audio
            .as_ref()
            .context("Media has no supported audio track")?,
    };

    println!(
        "Track {} ({:?}): {} samples, timescale {}",
        track.track_id,
        track.kind,
        track.len(),
        track.timescale
    );
    println!(
        "{:>6}  {:>12}  {:>8}  {:>10}  {:>10}  {:>9}  key",
        "index", "offset", "size", "dts", "pts", "duration"
    );
    for sample in track.samples().iter().take(limit) {
        println!(
            "{:>6}  {:>12}  {:>8}  {:>10.4}  {:>10.4}  {:>9.4}  {}",
            sample.index,
            sample.offset,
            sample.size,
            sample.timestamp,
            sample.pts,
            sample.duration,
            if sample.is_keyframe { "*" } else { "" }
        );
    }
    if track.len() > limit {
        println!("... {} more", track.len() - limit);
    }

    Ok(())
}

fn simulate(
    file: &Path,
    config_path: Option<&Path>,
    seconds: f64,
    looping: bool,
    json: bool,
) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }
    if !seconds.is_finite() || seconds < 0.0 {
        anyhow::bail!("Invalid duration: {}", seconds);
    }

    let mut config = config::load_config_or_default(config_path)?;
    if looping {
        config.player.looping = true;
    }

    let url = file.to_string_lossy();
    let mut sim = Simulation::start(&config, &url)?;

    tracing::info!(
        url = %url,
        seconds,
        tick = config.playback.tick_secs,
        looping = config.player.looping,
        "Starting simulation"
    );

    for sample in sim.run(seconds) {
        if json {
            println!("{}", serde_json::to_string(&sample)?);
        } else {
            println!(
                "[{:>6.2}s] state={:?} time={:.3} frames={} queued_audio={}",
                sample.elapsed, sample.state, sample.time, sample.frames, sample.queued_audio
            );
        }
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            let url = if config.player.url.is_empty() {
                "(none)"
            } else {
                config.player.url.as_str()
            };
            println!("  Url: {}", url);
            println!("  Loop: {}", config.player.looping);
            println!("  Volume: {}", config.player.volume);
            println!("  Audio ring capacity: {}", config.player.audio_ring_capacity);
            println!("  Tick: {:.4}s", config.playback.tick_secs);
            for warning in config.player.validate() {
                println!("  warning: {}", warning);
            }
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Volume: {}", config.player.volume);
            println!("  Audio ring capacity: {}", config.player.audio_ring_capacity);
            println!("  Tick: {:.4}s", config.playback.tick_secs);
        }
    }

    Ok(())
}
