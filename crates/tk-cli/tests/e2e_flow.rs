//! End-to-end tests for the tracking flow.
//!
//! Tests the full pipeline: start → switch → stop → log / summary / week / tags,
//! driving the built binary against a temporary sync folder.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output};

use chrono::{Duration, Utc};
use tempfile::{NamedTempFile, TempDir};

fn tk_binary() -> String {
    env!("CARGO_BIN_EXE_tk").to_string()
}

/// Writes a config file pointing at `sync_folder`, optionally pinning the device id.
fn write_config(sync_folder: &Path, device_id: Option<&str>) -> NamedTempFile {
    let mut config = NamedTempFile::new().unwrap();
    writeln!(config, r#"sync_folder = "{}""#, sync_folder.display()).unwrap();
    if let Some(device_id) = device_id {
        writeln!(config, r#"device_id = "{device_id}""#).unwrap();
    }
    config.flush().unwrap();
    config
}

/// Runs `tk` with an isolated home directory.
fn tk(home: &Path, config: &Path, args: &[&str]) -> Output {
    Command::new(tk_binary())
        .env("HOME", home)
        .env_remove("XDG_CONFIG_HOME")
        .env_remove("XDG_DATA_HOME")
        .env_remove("TK_SYNC_FOLDER")
        .env_remove("TK_DEVICE_ID")
        .arg("--config")
        .arg(config)
        .args(args)
        .output()
        .expect("failed to run tk")
}

fn stdout_of(output: &Output) -> String {
    assert!(
        output.status.success(),
        "tk failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).unwrap()
}

#[test]
fn test_start_switch_stop_and_report() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp.path().join("sync"), Some("laptop"));
    let run = |args: &[&str]| tk(temp.path(), config.path(), args);
    let base = Utc::now() - Duration::hours(1);
    let minute = |m: i64| (base + Duration::minutes(m)).to_rfc3339();

    let out = stdout_of(&run(&["start", "work", "email", "--at", minute(10).as_str()]));
    assert!(out.starts_with("Started email work at "), "{out}");

    let out = stdout_of(&run(&["status"]));
    assert!(out.starts_with("Tracking: email work since "), "{out}");

    let out = stdout_of(&run(&["start", "work", "coding", "--at", minute(40).as_str()]));
    assert!(out.contains("Stopped email work (30m)"), "{out}");

    let out = stdout_of(&run(&["stop", "--at", minute(55).as_str()]));
    assert!(out.starts_with("Stopped coding work at "), "{out}");
    assert!(out.trim_end().ends_with("(15m)"), "{out}");

    let out = stdout_of(&run(&["status"]));
    assert!(out.starts_with("Not tracking anything."), "{out}");

    let out = stdout_of(&run(&["log"]));
    assert_eq!(out.lines().count(), 3, "{out}");
    assert!(out.lines().nth(2).unwrap().ends_with("coding work"), "{out}");

    let out = stdout_of(&run(&["summary", "--json"]));
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json["total_ms"], 45 * 60_000);
    assert_eq!(json["by_tag"][0]["tag"], "work");
    assert_eq!(json["by_tag"][0]["total_ms"], 45 * 60_000);

    let out = stdout_of(&run(&["summary", "coding", "--json"]));
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json["total_ms"], 15 * 60_000);
    assert_eq!(json["filter"], serde_json::json!(["coding"]));

    let out = stdout_of(&run(&["tags"]));
    let tags: Vec<&str> = out
        .lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().next())
        .collect();
    assert_eq!(tags, vec!["coding", "email", "work"]);

    let out = stdout_of(&run(&["week", "work"]));
    assert!(out.contains("\nDay 0  1  2 "), "{out}");
    assert!(out.contains('█'), "{out}");
}

#[test]
fn test_stop_when_idle_fails() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp.path().join("sync"), Some("laptop"));

    let output = tk(temp.path(), config.path(), &["stop"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not tracking anything"), "{stderr}");
}

#[test]
fn test_future_start_is_rejected() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp.path().join("sync"), Some("laptop"));

    let output = tk(
        temp.path(),
        config.path(),
        &["start", "work", "--at", "2999-01-01T00:00:00Z"],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("future"), "{stderr}");
}

#[test]
fn test_inverted_range_is_rejected() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp.path().join("sync"), Some("laptop"));

    let output = tk(
        temp.path(),
        config.path(),
        &["summary", "--start", "2025-02-01", "--end", "2025-01-01"],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("is after end date"), "{stderr}");
}

#[test]
fn test_last_calendar_day_is_rejected() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp.path().join("sync"), Some("laptop"));

    for command in ["summary", "week", "log", "tags"] {
        let output = tk(temp.path(), config.path(), &[command, "--end", "+262142-12-31"]);
        assert!(!output.status.success(), "{command}");
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("outside the supported calendar"), "{command}: {stderr}");
    }
}

#[test]
fn test_init_required_without_configured_device() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp.path().join("sync"), None);

    let output = tk(temp.path(), config.path(), &["start", "work"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Run 'tk init' first"), "{stderr}");

    let out = stdout_of(&tk(temp.path(), config.path(), &["init", "--label", "laptop"]));
    assert!(out.contains("Label:       laptop"), "{out}");
    assert!(temp.path().join(".local/share/tk/device.json").exists());

    stdout_of(&tk(temp.path(), config.path(), &["start", "work"]));
    let out = stdout_of(&tk(temp.path(), config.path(), &["devices"]));
    assert!(out.contains("laptop"), "{out}");
    assert!(out.contains("(this device)"), "{out}");
}
