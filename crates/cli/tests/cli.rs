use assert_cmd::Command;
use predicates::prelude::*;

fn bookshelf() -> Command {
    Command::cargo_bin("bookshelf").unwrap()
}

#[test]
fn sum_prints_every_method() {
    bookshelf()
        .args(["sum", "100"])
        .assert()
        .success()
        .stdout(predicate::str::contains("formula: 5050"))
        .stdout(predicate::str::contains("iterative: 5050"))
        .stdout(predicate::str::contains("recursive: 5050"));
}

#[test]
fn sum_with_single_method() {
    bookshelf()
        .args(["sum", "10", "--method", "formula"])
        .assert()
        .success()
        .stdout("formula: 55\n");
}

#[test]
fn sum_rejects_zero() {
    bookshelf().args(["sum", "0"]).assert().failure();
}

#[test]
fn config_prints_resolved_settings() {
    bookshelf()
        .arg("config")
        .env("BOOKSHELF_ENV", "staging")
        .env("BOOKSHELF_CONFIG_DIR", "/nonexistent")
        .env("PORT", "4000")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"environment\": \"staging\""))
        .stdout(predicate::str::contains("\"port\": 4000"));
}
