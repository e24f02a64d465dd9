//! Smoke tests -- verify the binary runs and key modules load.

use assert_cmd::Command;

#[test]
fn test_cli_help() {
    Command::cargo_bin("fielddispatch")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains(
            "Dispatch engine for dealership field-service jobs",
        ));
}

#[test]
fn test_cli_version() {
    Command::cargo_bin("fielddispatch")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicates::str::contains("fielddispatch"));
}

#[test]
fn test_serve_subcommand_exists() {
    Command::cargo_bin("fielddispatch")
        .unwrap()
        .arg("serve")
        .arg("--help")
        .assert()
        .success();
}

#[test]
fn test_rank_subcommand_exists() {
    Command::cargo_bin("fielddispatch")
        .unwrap()
        .arg("rank")
        .arg("--help")
        .assert()
        .success();
}

#[test]
fn test_rules_list_subcommand_exists() {
    Command::cargo_bin("fielddispatch")
        .unwrap()
        .args(["rules", "list", "--help"])
        .assert()
        .success();
}

#[test]
fn test_rank_rejects_unknown_urgency() {
    Command::cargo_bin("fielddispatch")
        .unwrap()
        .args([
            "rank",
            "--dealership",
            "d-1",
            "--service",
            "svc-oil",
            "--urgency",
            "apocalyptic",
        ])
        .assert()
        .failure();
}
