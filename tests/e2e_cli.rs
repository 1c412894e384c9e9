//! CLI end-to-end tests
//!
//! Tests for the vidcore command-line interface.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{tempdir, TempDir};
use vidcore_media::fixture::{AudioTrackSpec, Mp4Builder, VideoTrackSpec};

/// Get a command for the vidcore binary
#[allow(deprecated)]
fn vidcore_cmd() -> Command {
    Command::cargo_bin("vidcore").unwrap()
}

/// Write a 2 s clip with audio into a fresh temp dir.
fn clip() -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("clip.mp4");
    Mp4Builder::new()
        .video(VideoTrackSpec::new(64, 48, 30, 60))
        .audio(AudioTrackSpec::new(44100, 2, 86))
        .write_to(&path)
        .unwrap();
    (dir, path)
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = vidcore_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = vidcore_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("vidcore"))
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_command() {
    let mut cmd = vidcore_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_probe_help() {
    let mut cmd = vidcore_cmd();
    cmd.args(["probe", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Probe a media file"));
}

#[test]
fn test_cli_probe_nonexistent_file() {
    let mut cmd = vidcore_cmd();
    cmd.args(["probe", "/nonexistent/path/movie.mp4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_probe_file() {
    let (_dir, path) = clip();
    let mut cmd = vidcore_cmd();
    cmd.args(["probe", arg(&path)])
        .assert()
        .success()
        .stdout(predicate::str::contains("Video: avc1."))
        .stdout(predicate::str::contains("64x48"))
        .stdout(predicate::str::contains("44100 Hz 2ch"));
}

#[test]
fn test_cli_probe_json_output() {
    let (_dir, path) = clip();
    let output = vidcore_cmd()
        .args(["probe", "--json", arg(&path)])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["video"]["width"], 64);
    assert_eq!(json["video"]["track"]["samples"], 60);
    assert_eq!(json["audio"]["format"]["sample_rate"], 44100);
}

#[test]
fn test_cli_probe_garbage_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("garbage.mp4");
    fs::write(&path, b"not a movie").unwrap();

    let mut cmd = vidcore_cmd();
    cmd.args(["probe", arg(&path)])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open"));
}

#[test]
fn test_cli_samples_limit() {
    let (_dir, path) = clip();
    let mut cmd = vidcore_cmd();
    cmd.args(["samples", "--limit", "5", arg(&path)])
        .assert()
        .success()
        .stdout(predicate::str::contains("60 samples"))
        .stdout(predicate::str::contains("... 55 more"));
}

#[test]
fn test_cli_samples_audio_track() {
    let (_dir, path) = clip();
    let mut cmd = vidcore_cmd();
    cmd.args(["samples", "--track", "audio", "-n", "2", arg(&path)])
        .assert()
        .success()
        .stdout(predicate::str::contains("Audio"))
        .stdout(predicate::str::contains("86 samples"));
}

#[test]
fn test_cli_simulate_reports_each_second() {
    let (_dir, path) = clip();
    let mut cmd = vidcore_cmd();
    cmd.args(["simulate", "--seconds", "3", arg(&path)])
        .assert()
        .success()
        .stdout(predicate::str::contains("state=Playing"))
        .stdout(predicate::str::contains("state=Paused"))
        .stdout(predicate::str::contains("frames="));
}

#[test]
fn test_cli_simulate_loop_json() {
    let (_dir, path) = clip();
    let output = vidcore_cmd()
        .args(["simulate", "--loop", "--json", "--seconds", "3", arg(&path)])
        .output()
        .unwrap();
    assert!(output.status.success());

    let lines: Vec<serde_json::Value> = String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    assert!(lines.iter().all(|l| l["state"] == "playing"));
    assert!(lines[2]["stats"]["loops"].as_u64().unwrap() >= 1);
}

#[test]
fn test_cli_simulate_with_config() {
    let (dir, path) = clip();
    let config_file = dir.path().join("config.toml");
    fs::write(
        &config_file,
        r#"
[player]
volume = 0.5
audio_ring_capacity = 4

[playback]
tick_secs = 0.05
threads = 1
"#,
    )
    .unwrap();

    let mut cmd = vidcore_cmd();
    cmd.args([
        "simulate",
        "--config",
        arg(&config_file),
        "--seconds",
        "1",
        arg(&path),
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains("queued_audio="));
}

#[test]
fn test_cli_validate_config() {
    let temp = tempdir().unwrap();
    let config_file = temp.path().join("config.toml");
    fs::write(
        &config_file,
        r#"
[player]
url = "movie.mp4"
loop = true
"#,
    )
    .unwrap();

    let mut cmd = vidcore_cmd();
    cmd.args(["validate", arg(&config_file)])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("Loop: true"));
}

#[test]
fn test_cli_validate_rejects_zero_tick() {
    let temp = tempdir().unwrap();
    let config_file = temp.path().join("config.toml");
    fs::write(&config_file, "[playback]\ntick_secs = 0.0\n").unwrap();

    let mut cmd = vidcore_cmd();
    cmd.args(["validate", arg(&config_file)]).assert().failure();
}

#[test]
fn test_cli_validate_malformed_toml() {
    let temp = tempdir().unwrap();
    let config_file = temp.path().join("config.toml");
    fs::write(&config_file, "[player\nvolume = ").unwrap();

    let mut cmd = vidcore_cmd();
    cmd.args(["validate", "--config", arg(&config_file)])
        .assert()
        .failure();
}
