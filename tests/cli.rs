// ABOUTME: External-interface tests — argument handling and exit codes

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn two_or_more_arguments_print_usage_and_exit_64() {
    Command::cargo_bin("loxide")
        .unwrap()
        .arg("one.lox")
        .arg("two.lox")
        .assert()
        .failure()
        .code(64)
        .stderr(predicate::str::starts_with("Usage:").and(predicate::str::contains("[script]")));
}

#[test]
fn a_nonexistent_script_path_does_not_panic() {
    Command::cargo_bin("loxide")
        .unwrap()
        .arg("/no/such/file.lox")
        .assert()
        .failure()
        .code(65);
}

#[test]
fn an_empty_script_succeeds_with_no_output() {
    let file = tempfile::NamedTempFile::new().unwrap();
    Command::cargo_bin("loxide")
        .unwrap()
        .arg(file.path())
        .assert()
        .success()
        .stdout("");
}
