//! Corruption recovery tests for lift.
//!
//! These tests verify the system can handle:
//! - Corrupted active workout snapshots
//! - Corrupted WAL files
//! - Corrupted or invalid libraries
//! - Partial writes

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::Write as IoWrite;
use std::path::PathBuf;
use tempfile::TempDir;

fn cli(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("lift"));
    cmd.env("XDG_CONFIG_HOME", temp_dir.path().join("config"))
        .arg("--data-dir")
        .arg(temp_dir.path().join("data"));
    cmd
}

fn setup_test_dir() -> (TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = temp_dir.path().join("data");
    fs::create_dir_all(data_dir.join("wal")).unwrap();
    (temp_dir, data_dir)
}

const LIBRARY: &str = r#"{
  "exercises": {
    "squat": { "id": "squat", "name": "Back Squat", "category": "compound", "equipment_type": "barbell" }
  },
  "routines": {
    "day_a": {
      "id": "day_a",
      "name": "Day A",
      "exercises": [ { "exercise_id": "squat", "target_sets": 1, "rest_seconds": 0 } ]
    }
  }
}"#;

#[test]
fn test_corrupted_active_session_is_ignored() {
    let (temp_dir, data_dir) = setup_test_dir();
    fs::write(data_dir.join("active_session.json"), "{ invalid json }}}}").unwrap();

    cli(&temp_dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No active workout."));
}

#[test]
fn test_new_workout_replaces_corrupted_snapshot() {
    let (temp_dir, data_dir) = setup_test_dir();
    fs::write(data_dir.join("library.json"), LIBRARY).unwrap();
    let snapshot_path = data_dir.join("active_session.json");
    fs::write(&snapshot_path, "corrupted").unwrap();

    cli(&temp_dir).args(["start", "day_a"]).assert().success();

    let contents = fs::read_to_string(&snapshot_path).expect("Snapshot should exist");
    let parsed: Result<serde_json::Value, _> = serde_json::from_str(&contents);
    assert!(parsed.is_ok(), "Snapshot should be valid JSON");
}

#[test]
fn test_corrupted_wal_lines_are_skipped() {
    let (temp_dir, data_dir) = setup_test_dir();
    fs::write(data_dir.join("library.json"), LIBRARY).unwrap();
    let wal_path = data_dir.join("wal/workout_sessions.wal");
    fs::write(&wal_path, "{ invalid json }\n{ more invalid }\n").unwrap();

    cli(&temp_dir).args(["start", "day_a"]).assert().success();
    cli(&temp_dir)
        .args(["done", "1", "--weight", "100"])
        .assert()
        .success();
    cli(&temp_dir).arg("finish").assert().success();

    cli(&temp_dir)
        .args(["history", "squat"])
        .assert()
        .success()
        .stdout(predicate::str::contains("top 100"));
}

#[test]
fn test_partial_wal_line() {
    let (temp_dir, data_dir) = setup_test_dir();

    // Partial last line, as left by a crash during write
    let wal_path = data_dir.join("wal/workout_sessions.wal");
    let mut file = fs::File::create(&wal_path).unwrap();
    write!(file, r#"{{"id":"partial"#).unwrap();
    drop(file);

    cli(&temp_dir).arg("weekly").assert().success();

    cli(&temp_dir)
        .arg("rollup")
        .assert()
        .success()
        .stdout(predicate::str::contains("Rolled up 0 sessions"));
}

#[test]
fn test_empty_files() {
    let (temp_dir, data_dir) = setup_test_dir();
    fs::write(data_dir.join("wal/workout_sessions.wal"), "").unwrap();
    fs::write(data_dir.join("sessions.csv"), "").unwrap();

    cli(&temp_dir)
        .args(["history", "squat"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No completed sets yet."));
}

#[test]
fn test_corrupted_library_is_reported() {
    let (temp_dir, data_dir) = setup_test_dir();
    let library_path = data_dir.join("library.json");
    fs::write(&library_path, "{ not valid json at all }").unwrap();

    cli(&temp_dir)
        .args(["start", "day_a"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Json"));

    // The library is never overwritten with defaults
    assert_eq!(
        fs::read_to_string(&library_path).unwrap(),
        "{ not valid json at all }"
    );
}

#[test]
fn test_invalid_routine_is_reported() {
    let (temp_dir, data_dir) = setup_test_dir();
    fs::write(
        data_dir.join("library.json"),
        LIBRARY.replace(r#""target_sets": 1"#, r#""target_sets": 0"#),
    )
    .unwrap();

    cli(&temp_dir)
        .arg("routines")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no target sets"));
}

#[test]
fn test_deleted_exercise_in_routine() {
    let (temp_dir, data_dir) = setup_test_dir();
    fs::write(
        data_dir.join("library.json"),
        LIBRARY.replace(r#""squat": { "id": "squat""#, r#""gone": { "id": "gone""#),
    )
    .unwrap();

    cli(&temp_dir)
        .args(["start", "day_a"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Unknown exercise"));

    cli(&temp_dir)
        .arg("finish")
        .assert()
        .success()
        .stdout(predicate::str::contains("Workout logged"));
}
