use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn test_help_shows_all_commands() {
    cargo_bin_cmd!("aura")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("ask"))
        .stdout(predicate::str::contains("upload"))
        .stdout(predicate::str::contains("reset"))
        .stdout(predicate::str::contains("forget"))
        .stdout(predicate::str::contains("--server"));
}

#[test]
fn test_ask_help_shows_options() {
    cargo_bin_cmd!("aura")
        .args(["ask", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--prompt"))
        .stdout(predicate::str::contains("--file-id"))
        .stdout(predicate::str::contains("--plain"));
}

#[test]
fn test_ask_rejects_file_and_file_id_together() {
    cargo_bin_cmd!("aura")
        .args(["ask", "-p", "hi", "--file", "a.pdf", "--file-id", "f1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_version_flag() {
    cargo_bin_cmd!("aura")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1"));
}
