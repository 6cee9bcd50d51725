use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Config with a temp database and an unreachable instance; `schedule` is
/// appended verbatim
fn write_config(dir: &TempDir, schedule: &str) -> PathBuf {
    let db_path = dir.path().join("history.sqlite");
    let content = format!(
        "[general]\ndb_path = {:?}\n\n[mastodon]\ninstance_url = \"http://127.0.0.1:9\"\nrequest_delay_ms = 0\ntimeout_secs = 1\n\n[schedule]\n{}\n",
        db_path.display().to_string(),
        schedule
    );
    let path = dir.path().join("config.toml");
    fs::write(&path, content).expect("write config");
    path
}

const EVERY_DAY: &str = r#"monday = ["rust"]
tuesday = ["rust"]
wednesday = ["rust"]
thursday = ["rust"]
friday = ["rust"]
saturday = ["rust"]
sunday = ["rust"]"#;

#[test]
fn config_init_writes_example_file() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = dir.path().join("config.toml");

    let mut cmd = cargo_bin_cmd!("hashtag-tracker");
    cmd.args(["config", "init", "--path"])
        .arg(&config_path)
        .assert()
        .success();

    let content = fs::read_to_string(&config_path).expect("read config");
    assert!(content.contains("[schedule]"));
    assert!(content.contains("instance_url"));
}

#[test]
fn config_init_refuses_to_overwrite() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, "# mine").expect("write");

    let mut cmd = cargo_bin_cmd!("hashtag-tracker");
    cmd.args(["config", "init", "--path"])
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    assert_eq!(fs::read_to_string(&config_path).unwrap(), "# mine");
}

#[test]
fn today_lists_scheduled_tag() {
    let dir = TempDir::new().expect("temp dir");
    let config = write_config(&dir, EVERY_DAY);

    let mut cmd = cargo_bin_cmd!("hashtag-tracker");
    cmd.arg("--config")
        .arg(&config)
        .arg("today")
        .assert()
        .success()
        .stdout(predicate::str::contains("#rust"));
}

#[test]
fn today_without_schedule_is_business_error() {
    let dir = TempDir::new().expect("temp dir");
    let config = write_config(&dir, "");

    let mut cmd = cargo_bin_cmd!("hashtag-tracker");
    cmd.arg("--config")
        .arg(&config)
        .arg("today")
        .assert()
        .failure()
        .stderr(predicate::str::contains("business_error"));
}

#[test]
fn collect_rejects_inverted_range() {
    let dir = TempDir::new().expect("temp dir");
    let config = write_config(&dir, EVERY_DAY);

    let mut cmd = cargo_bin_cmd!("hashtag-tracker");
    cmd.arg("--config")
        .arg(&config)
        .args(["collect", "--from", "2024-01-10", "--to", "2024-01-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("validation_error"));
}

#[test]
fn collect_single_tag_accepts_a_date() {
    let dir = TempDir::new().expect("temp dir");
    let config = write_config(&dir, EVERY_DAY);

    let mut cmd = cargo_bin_cmd!("hashtag-tracker");
    cmd.arg("--config")
        .arg(&config)
        .args(["collect", "--tag", "rust", "--date", "2024-13-40"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("validation_error"));

    // The instance is unreachable, so the tag is reported as failed
    let mut cmd = cargo_bin_cmd!("hashtag-tracker");
    let output = cmd
        .arg("--config")
        .arg(&config)
        .args(["collect", "--tag", "rust", "--date", "2024-01-15", "--json"])
        .output()
        .expect("run collect");
    assert!(output.status.success());
    let value: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(value["hashtag"], "rust");
    assert_eq!(value["status"], "failed");
}

#[test]
fn analyze_rejects_bad_input_before_fetching() {
    let dir = TempDir::new().expect("temp dir");
    let config = write_config(&dir, EVERY_DAY);

    let mut cmd = cargo_bin_cmd!("hashtag-tracker");
    cmd.arg("--config")
        .arg(&config)
        .args(["analyze", "two words"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("validation_error"));

    let mut cmd = cargo_bin_cmd!("hashtag-tracker");
    cmd.arg("--config")
        .arg(&config)
        .args(["analyze", "rust", "--date", "2024-13-40"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("validation_error"));
}

#[test]
fn history_and_prune_on_empty_database() {
    let dir = TempDir::new().expect("temp dir");
    let config = write_config(&dir, EVERY_DAY);

    let mut cmd = cargo_bin_cmd!("hashtag-tracker");
    let output = cmd
        .arg("--config")
        .arg(&config)
        .args(["history", "--json"])
        .output()
        .expect("run history");
    assert!(output.status.success());
    let value: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(value, Value::Array(vec![]));

    let mut cmd = cargo_bin_cmd!("hashtag-tracker");
    cmd.arg("--config")
        .arg(&config)
        .args(["prune", "--days", "30"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted 0 rows"));

    assert!(dir.path().join("history.sqlite").exists());
}
