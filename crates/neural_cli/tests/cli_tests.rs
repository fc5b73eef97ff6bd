//! Drives the `neural` binary against a temporary workspace.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn neural(workspace: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_neural"))
        .args(args)
        .arg("--workspace")
        .arg(workspace)
        .env("NEURAL_COMPILE_DELAY_MS", "0")
        .env_remove("NEURAL_FAILURE_PROBABILITY")
        .env_remove("NEURAL_WORKSPACE")
        .output()
        .expect("failed to launch neural")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("neural.toml"),
        "[pipeline]\nfailure_probability = 0.0\n",
    )
    .unwrap();
    dir
}

#[test]
fn test_offline_run_then_browse() {
    let dir = workspace();

    let run = neural(dir.path(), &["run", "todo app", "--offline"]);
    assert!(run.status.success(), "{}", String::from_utf8_lossy(&run.stderr));
    let out = stdout(&run);
    assert!(out.contains("[manager]") || out.contains("Requirements Analysis"));
    assert!(out.contains("Build ready"));

    let files = neural(dir.path(), &["files"]);
    assert!(files.status.success());
    assert!(stdout(&files).contains("src/App.tsx"));

    let history = neural(dir.path(), &["history"]);
    assert!(stdout(&history).contains("History (7 snapshots)"));

    let status = neural(dir.path(), &["status", "--json"]);
    let json: serde_json::Value = serde_json::from_str(&stdout(&status)).unwrap();
    assert_eq!(json["status"], "ready");
    assert_eq!(json["prompt"], "todo app");
}

#[test]
fn test_forced_failure_still_ends_ready() {
    let dir = workspace();

    let run = neural(dir.path(), &["run", "todo app", "--offline", "--force-failure"]);
    assert!(run.status.success());
    assert!(stdout(&run).contains("Self-healing patches: 1"));
}

#[test]
fn test_rollback_unknown_snapshot_is_invalid_args() {
    let dir = workspace();
    let output = neural(dir.path(), &["rollback", "zzzz"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_bad_config_exit_code() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("neural.toml"),
        "[pipeline]\nfailure_probability = 2.0\n",
    )
    .unwrap();

    let output = neural(dir.path(), &["status"]);
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn test_reset_clears_session() {
    let dir = workspace();
    neural(dir.path(), &["run", "todo app", "--offline"]);

    let reset = neural(dir.path(), &["reset", "--yes"]);
    assert!(reset.status.success());

    let status = neural(dir.path(), &["status", "--json"]);
    let json: serde_json::Value = serde_json::from_str(&stdout(&status)).unwrap();
    assert_eq!(json["status"], "idle");
    assert_eq!(json["fileCount"], 0);
}
