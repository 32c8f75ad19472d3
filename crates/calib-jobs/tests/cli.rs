#![cfg(feature = "cli")]

use assert_cmd::Command;
use calib_jobs::{CalibrationResult, FsStore, JobMetadata, ResultSink, RunStore};
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn calib_jobs() -> Command {
    let mut cmd = Command::cargo_bin("calib-jobs").expect("binary built");
    cmd.env_clear();
    cmd
}

fn write_payload(dir: &Path, body: serde_json::Value) -> std::path::PathBuf {
    let path = dir.join("job.json");
    fs::write(&path, body.to_string()).expect("write payload");
    path
}

fn seed_run(root: &Path, run_id: &str) {
    let sink = RunStore::new(FsStore::new(root));
    let result = CalibrationResult {
        camera_matrix: [[812.5, 0.0, 320.0], [0.0, 811.0, 240.0], [0.0, 0.0, 1.0]],
        dist: vec![-0.21, 0.05, 0.0, 0.0, 0.0],
        processed_images: 14,
        total_images: 15,
    };
    sink.save_result(run_id, &result).expect("save result");
    sink.save_metadata(
        run_id,
        &JobMetadata::new(run_id, "rig/cam1", calib_jobs::BoardSize::new(9, 6)),
    )
    .expect("save metadata");
}

#[test]
fn validate_prints_normalized_metadata() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_payload(
        dir.path(),
        serde_json::json!({
            "metadata": {"run_id": "cli-run", "dataset": "rig/cam1", "checkerboard_size": [9, 6]},
            "images": ["a.png", "b.png"]
        }),
    );

    calib_jobs()
        .arg("validate")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"run_id\": \"cli-run\""))
        .stdout(predicate::str::contains("\"calibration_accuracy\": 0.001"))
        .stdout(predicate::str::contains("b.png"));
}

#[test]
fn validate_rejects_empty_image_list() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_payload(
        dir.path(),
        serde_json::json!({
            "metadata": {"run_id": "cli-run", "dataset": "d", "checkerboard_size": [9, 6]},
            "images": []
        }),
    );

    calib_jobs()
        .arg("validate")
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("`images` must not be empty"));
}

#[test]
fn validate_reports_unreadable_file() {
    calib_jobs()
        .args(["validate", "/nonexistent/job.json"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("job.json"));
}

#[test]
fn show_prints_stored_run() {
    let dir = TempDir::new().expect("tempdir");
    seed_run(dir.path(), "cam1-2024");

    calib_jobs()
        .args(["show", "cam1-2024", "--store"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"processed_images\": 14"))
        .stdout(predicate::str::contains("\"dataset\": \"rig/cam1\""));
}

#[test]
fn show_unknown_run_exits_with_not_found() {
    let dir = TempDir::new().expect("tempdir");

    calib_jobs()
        .args(["show", "nobody", "--store"])
        .arg(dir.path())
        .assert()
        .code(3)
        .stderr(predicate::str::contains("nobody"));
}

#[test]
fn show_reads_store_location_from_environment() {
    let dir = TempDir::new().expect("tempdir");
    seed_run(&dir.path().join("calibration"), "from-env");

    calib_jobs()
        .current_dir(dir.path())
        .env("R2_ENDPOINT_URL", format!("file://{}", dir.path().display()))
        .env("r2_access_key", "key")
        .env("R2_SECRET_ACCESS_KEY", "secret")
        .env("R2_BUCKET", "calibration")
        .args(["show", "from-env"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"run_id\": \"from-env\""));
}

#[test]
fn show_without_storage_settings_fails() {
    let dir = TempDir::new().expect("tempdir");

    calib_jobs()
        .current_dir(dir.path())
        .args(["show", "anything"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("R2_ENDPOINT_URL"));
}

#[test]
fn log_level_can_come_from_environment() {
    let dir = TempDir::new().expect("tempdir");

    calib_jobs()
        .env("CALIB_JOBS_LOG", "info")
        .args(["show", "quiet-run", "--store"])
        .arg(dir.path())
        .assert()
        .code(3)
        .stderr(predicate::str::contains("store] run `quiet-run`: no result stored"));

    calib_jobs()
        .env("CALIB_JOBS_LOG", "info")
        .args(["--log-level", "error", "show", "quiet-run", "--store"])
        .arg(dir.path())
        .assert()
        .code(3)
        .stderr(predicate::str::contains("no result stored").not());
}
