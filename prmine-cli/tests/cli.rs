use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_subcommands() {
    Command::cargo_bin("prmine")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("sync"));
}

#[test]
fn init_creates_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("prmine.db");

    Command::cargo_bin("prmine")
        .unwrap()
        .current_dir(dir.path())
        .arg("init")
        .arg("--db-path")
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized database"));

    assert!(db.exists());
}

#[test]
fn init_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("prmine.db");

    for _ in 0..2 {
        Command::cargo_bin("prmine")
            .unwrap()
            .current_dir(dir.path())
            .arg("init")
            .arg("--db-path")
            .arg(&db)
            .assert()
            .success();
    }
}

#[test]
fn invalid_config_exits_with_config_code() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("prmine.toml");
    std::fs::write(&config, "[sync]\nprs_per_page = 0\n").unwrap();

    Command::cargo_bin("prmine")
        .unwrap()
        .current_dir(dir.path())
        .arg("init")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .code(2);
}
