use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn test_config_path_command() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("aura")
        .env("AURA_HOME", dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_init_creates_file() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");

    assert!(!config_path.exists());

    cargo_bin_cmd!("aura")
        .env("AURA_HOME", dir.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created config at"));

    assert!(config_path.exists());

    let contents = fs::read_to_string(&config_path).unwrap();
    assert!(contents.contains("server_url ="));
    assert!(contents.contains("[reveal]"));
}

#[test]
fn test_config_init_fails_if_exists() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");

    fs::write(&config_path, "# existing config").unwrap();

    cargo_bin_cmd!("aura")
        .env("AURA_HOME", dir.path())
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_config_generate_prints_defaults() {
    cargo_bin_cmd!("aura")
        .args(["config", "generate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("server_url = \"http://127.0.0.1:5000\""))
        .stdout(predicate::str::contains("chunking = \"char\""));
}

#[test]
fn test_config_generate_keeps_template_and_ignores_broken_config() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("config.toml"), "server_url = [").unwrap();

    cargo_bin_cmd!("aura")
        .env("AURA_HOME", dir.path())
        .args(["config", "generate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("# Write logs to"))
        .stdout(predicate::str::contains("[log]"))
        .stdout(predicate::str::contains("level = \"info\""));
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("config.toml"),
        "[reveal]\nchunking = \"burst\"\nburst_min = 9\nburst_max = 2\n",
    )
    .unwrap();

    cargo_bin_cmd!("aura")
        .env("AURA_HOME", dir.path())
        .args(["reset"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid config"));
}
