//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own temporary HOME so the
//! config file and database start empty.

use std::path::Path;
use std::process::Command;

use serde::Deserialize;
use tempfile::TempDir;

#[derive(Debug, Deserialize)]
struct Snapshot {
    #[serde(rename = "type")]
    kind: String,
    phase: String,
    running: bool,
    remaining_secs: u64,
    remaining_label: String,
    cycles_completed: u32,
    phase_end: Option<String>,
}

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_focus-cli"))
        .args(args)
        .env("HOME", home)
        .env("FOCUS_ENV", "dev")
        .env_remove("FOCUS_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_cli_success(home: &Path, args: &[&str]) -> String {
    let (stdout, stderr, code) = run_cli(home, args);
    assert_eq!(code, 0, "CLI command {args:?} failed: {stderr}");
    stdout
}

/// The snapshot is always the last pretty-printed JSON document.
fn last_snapshot(stdout: &str) -> Snapshot {
    let start = stdout.rfind("\n{").map(|i| i + 1).unwrap_or(0);
    serde_json::from_str(&stdout[start..]).expect("Failed to parse snapshot")
}

#[test]
fn test_status_on_fresh_home_is_idle_work() {
    let home = TempDir::new().unwrap();
    let snapshot = last_snapshot(&run_cli_success(home.path(), &["timer", "status"]));
    assert_eq!(snapshot.kind, "StateSnapshot");
    assert_eq!(snapshot.phase, "work");
    assert!(!snapshot.running);
    assert_eq!(snapshot.remaining_secs, 1500);
    assert_eq!(snapshot.remaining_label, "25:00");
}

#[test]
fn test_start_persists_across_invocations() {
    let home = TempDir::new().unwrap();
    let started = last_snapshot(&run_cli_success(home.path(), &["timer", "start"]));
    assert!(started.running);
    assert!(started.phase_end.is_some());

    let status = last_snapshot(&run_cli_success(home.path(), &["timer", "status"]));
    assert!(status.running);
    assert_eq!(status.phase_end, started.phase_end);
    assert!(status.remaining_secs <= 1500 && status.remaining_secs > 1400);
}

#[test]
fn test_pause_then_resume() {
    let home = TempDir::new().unwrap();
    run_cli_success(home.path(), &["timer", "start"]);

    let paused = last_snapshot(&run_cli_success(home.path(), &["timer", "pause"]));
    assert_eq!(paused.phase, "paused");
    assert!(paused.phase_end.is_none());

    let alerts = run_cli_success(home.path(), &["alerts", "list"]);
    let alerts: serde_json::Value = serde_json::from_str(&alerts).unwrap();
    assert_eq!(alerts.as_array().map(Vec::len), Some(0));

    let resumed = last_snapshot(&run_cli_success(home.path(), &["timer", "resume"]));
    assert_eq!(resumed.phase, "work");
    assert!(resumed.running);
}

#[test]
fn test_start_installs_alert_series() {
    let home = TempDir::new().unwrap();
    run_cli_success(home.path(), &["timer", "start"]);

    let alerts = run_cli_success(home.path(), &["alerts", "list"]);
    let alerts: serde_json::Value = serde_json::from_str(&alerts).unwrap();
    let alerts = alerts.as_array().unwrap();
    assert_eq!(alerts.len(), 8);
    assert_eq!(alerts[0]["title"], "Pomodoro complete");
}

#[test]
fn test_reset_returns_to_idle_work() {
    let home = TempDir::new().unwrap();
    run_cli_success(home.path(), &["timer", "start"]);
    let out = run_cli_success(home.path(), &["timer", "reset"]);
    assert!(out.contains("SessionReset"));

    let status = last_snapshot(&run_cli_success(home.path(), &["timer", "status"]));
    assert!(!status.running);
    assert_eq!(status.cycles_completed, 0);
    assert_eq!(status.remaining_secs, 1500);
}

#[test]
fn test_config_get_set() {
    let home = TempDir::new().unwrap();
    let out = run_cli_success(home.path(), &["config", "get", "session.work_minutes"]);
    assert_eq!(out.trim(), "25");

    run_cli_success(home.path(), &["config", "set", "session.work_minutes", "50"]);
    let out = run_cli_success(home.path(), &["config", "get", "session.work_minutes"]);
    assert_eq!(out.trim(), "50");
}

#[test]
fn test_session_config_change_resets_running_session() {
    let home = TempDir::new().unwrap();
    run_cli_success(home.path(), &["timer", "start"]);
    run_cli_success(home.path(), &["config", "set", "session.work_minutes", "40"]);

    let status = last_snapshot(&run_cli_success(home.path(), &["timer", "status"]));
    assert!(!status.running);
    assert_eq!(status.remaining_secs, 40 * 60);
}

#[test]
fn test_config_rejects_zero_duration() {
    let home = TempDir::new().unwrap();
    let (_, stderr, code) =
        run_cli(home.path(), &["config", "set", "session.short_break_minutes", "0"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_config_get_unknown_key_fails() {
    let home = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["config", "get", "session.nap_minutes"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("unknown key"));
}

#[test]
fn test_stats_on_fresh_home() {
    let home = TempDir::new().unwrap();
    let out = run_cli_success(home.path(), &["stats", "all"]);
    let stats: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(stats["total_segments"], 0);
}
