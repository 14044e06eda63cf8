//! Integration tests for the palin-dispatch CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Binary run inside `dir` with no pacing delays and an isolated HOME
fn dispatch(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("palin-dispatch").unwrap();
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env_remove("RUST_LOG")
        .env("PALIN_WORKER__THINK_MAX_MS", "0")
        .env("PALIN_WORKER__HOLD_MS", "0");
    cmd
}

fn sorted_lines(path: &Path) -> Vec<String> {
    let mut lines: Vec<String> = fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    lines.sort();
    lines
}

/// Help is treated as a failed invocation
#[test]
fn test_help_exits_nonzero() {
    let mut cmd = Command::cargo_bin("palin-dispatch").unwrap();
    cmd.arg("--help")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_version() {
    let mut cmd = Command::cargo_bin("palin-dispatch").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("palin-dispatch"));
}

#[test]
fn test_unknown_flag_is_rejected() {
    let mut cmd = Command::cargo_bin("palin-dispatch").unwrap();
    cmd.arg("--bogus")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error"));
}

/// Full run over the default input file
#[test]
fn test_classifies_default_input() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("infile.txt"), "civic\nhello\nracecar\n").unwrap();

    dispatch(temp_dir.path())
        .args(["-n", "3", "-s", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Classified 3 of 3 items"));

    assert_eq!(
        sorted_lines(&temp_dir.path().join("palin.out")),
        vec!["civic", "racecar"]
    );
    assert_eq!(sorted_lines(&temp_dir.path().join("nopalin.out")), vec!["hello"]);

    let journal = fs::read_to_string(temp_dir.path().join("output.log")).unwrap();
    assert!(journal.lines().next().unwrap().ends_with("coordinator loaded 3 items"));
    assert!(journal.lines().last().unwrap().ends_with("coordinator exit"));
    assert_eq!(journal.matches("terminated with exit code 0").count(), 3);
}

#[test]
fn test_positional_input_and_quiet() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("words.txt"), "level\nrust\n").unwrap();

    dispatch(temp_dir.path())
        .args(["-q", "-n", "10", "words.txt"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    assert_eq!(sorted_lines(&temp_dir.path().join("palin.out")), vec!["level"]);
    assert_eq!(sorted_lines(&temp_dir.path().join("nopalin.out")), vec!["rust"]);
}

/// Zero concurrency never completes; only the runtime limit ends it
#[test]
fn test_zero_concurrency_times_out() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("infile.txt"), "civic\n").unwrap();

    dispatch(temp_dir.path())
        .args(["-s", "0", "-t", "1"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("Run cancelled"));

    let journal = fs::read_to_string(temp_dir.path().join("output.log")).unwrap();
    assert!(journal.contains("signal 14 received"));
    assert!(!journal.contains("started worker"));
}

#[test]
fn test_missing_input_is_setup_failure() {
    let temp_dir = TempDir::new().unwrap();

    dispatch(temp_dir.path())
        .arg("absent.txt")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot read input"));
}

#[test]
fn test_empty_input_is_setup_failure() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("infile.txt"), "").unwrap();

    dispatch(temp_dir.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("contains no items"));
}

#[test]
fn test_print_config_defaults_and_flags() {
    let temp_dir = TempDir::new().unwrap();

    dispatch(temp_dir.path())
        .args(["--print-config", "-n", "9"])
        .assert()
        .success()
        .stdout(predicate::str::contains("total_jobs = 9"))
        .stdout(predicate::str::contains("concurrency = 2"))
        .stdout(predicate::str::contains("max_runtime = 100"));
}

/// Repository file, then environment, then flags
#[test]
fn test_config_layers() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("palin-dispatch.toml"),
        "total_jobs = 1\nmax_runtime = 7\n",
    )
    .unwrap();

    dispatch(temp_dir.path())
        .env("PALIN_MAX_RUNTIME", "8")
        .env("PALIN_CONCURRENCY", "50")
        .arg("--print-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("total_jobs = 1"))
        .stdout(predicate::str::contains("max_runtime = 8"))
        .stdout(predicate::str::contains("concurrency = 20"));
}

#[test]
fn test_custom_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("custom.yaml");
    fs::write(&config_path, "total_jobs: 5\noutput:\n  journal: run.log\n").unwrap();

    dispatch(temp_dir.path())
        .arg("--config")
        .arg(&config_path)
        .arg("--print-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("total_jobs = 5"))
        .stdout(predicate::str::contains("journal = \"run.log\""));

    dispatch(temp_dir.path())
        .args(["--config", "missing.toml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Config file not found"));
}
