//! CLI integration tests: exercise the `scopeward` binary end-to-end
//! through `assert_cmd`, the way a user would invoke it.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn scopeward() -> Command {
    Command::cargo_bin("scopeward").unwrap()
}

fn temp_repo() -> TempDir {
    TempDir::new().unwrap()
}

#[test]
fn help_lists_subcommands() {
    scopeward()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("replay"));
}

#[test]
fn version_flag_succeeds() {
    scopeward().arg("--version").assert().success();
}

#[test]
fn config_init_writes_default_file() {
    let dir = temp_repo();
    scopeward()
        .current_dir(dir.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("scopeward.toml"));
    assert!(dir.path().join("scopeward.toml").exists());
}

#[test]
fn config_init_refuses_to_overwrite() {
    let dir = temp_repo();
    scopeward().current_dir(dir.path()).args(["config", "init"]).assert().success();
    scopeward().current_dir(dir.path()).args(["config", "init"]).assert().failure();
}

#[test]
fn config_show_prints_defaults_without_a_file() {
    let dir = temp_repo();
    scopeward()
        .current_dir(dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("max_attempts"));
}

#[test]
fn config_validate_accepts_defaults() {
    let dir = temp_repo();
    scopeward()
        .current_dir(dir.path())
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("valid"));
}

#[test]
fn run_dry_run_with_no_mock_responses_reports_failure() {
    let dir = temp_repo();
    // With --dry-run and no canned responses queued, the mock backend's
    // first call exhausts immediately; the run should still exit cleanly
    // (non-zero) rather than panicking.
    scopeward()
        .current_dir(dir.path())
        .args(["run", "add a widget", "--dry-run", "--max-iterations", "3"])
        .assert()
        .code(predicate::in_iter([0, 1, 2]));
}

#[test]
fn replay_reports_missing_checkpoint_file() {
    scopeward().args(["replay", "/nonexistent/checkpoints.jsonl"]).assert().failure();
}
