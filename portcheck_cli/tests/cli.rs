use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Commands run against an isolated config/data home so tests never touch
/// the user's real files. None of them hit the network.
fn isolated_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("portcheck").unwrap();
    cmd.env("XDG_CONFIG_HOME", dir.path().join("config"))
        .env(
            "PORTCHECK_CACHE__DB_PATH",
            dir.path().join("cache.db").display().to_string(),
        );
    cmd
}

#[test]
fn test_version() {
    let mut cmd = Command::cargo_bin("portcheck").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_help_lists_commands() {
    let mut cmd = Command::cargo_bin("portcheck").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("resolve"))
        .stdout(predicate::str::contains("batch"))
        .stdout(predicate::str::contains("cache"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_config_list_shows_defaults() {
    let dir = TempDir::new().unwrap();
    isolated_cmd(&dir)
        .arg("config")
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("resolver.ttl_days = 7"))
        .stdout(predicate::str::contains("sources.min_confidence = 0.5"));
}

#[test]
fn test_config_set_then_get() {
    let dir = TempDir::new().unwrap();
    isolated_cmd(&dir)
        .arg("config")
        .arg("set")
        .arg("resolver.ttl_days")
        .arg("14")
        .assert()
        .success();

    isolated_cmd(&dir)
        .arg("config")
        .arg("get")
        .arg("resolver.ttl_days")
        .assert()
        .success()
        .stdout(predicate::str::contains("14"));
}

#[test]
fn test_config_rejects_invalid_ttl() {
    let dir = TempDir::new().unwrap();
    isolated_cmd(&dir)
        .arg("config")
        .arg("set")
        .arg("resolver.ttl_days")
        .arg("0")
        .assert()
        .failure();
}

#[test]
fn test_cache_stats_on_fresh_database() {
    let dir = TempDir::new().unwrap();
    isolated_cmd(&dir)
        .arg("cache")
        .arg("stats")
        .arg("--kind")
        .arg("availability")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 entries"));
}

#[test]
fn test_cache_clear_on_fresh_database() {
    let dir = TempDir::new().unwrap();
    isolated_cmd(&dir)
        .arg("cache")
        .arg("clear")
        .arg("--kind")
        .arg("review")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 entries removed"));
}

#[test]
fn test_cache_stats_json_output() {
    let dir = TempDir::new().unwrap();
    isolated_cmd(&dir)
        .arg("--json")
        .arg("cache")
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"type\": \"stats\""))
        .stdout(predicate::str::contains("\"count\": 0"));
}

#[test]
fn test_request_dispatches_json_from_stdin() {
    let dir = TempDir::new().unwrap();
    isolated_cmd(&dir)
        .arg("request")
        .write_stdin(r#"{"type": "cache_stats", "kind": "availability"}"#)
        .assert()
        .success()
        .stdout(predicate::str::contains("0 entries"));
}

#[test]
fn test_request_rejects_unknown_tag() {
    let dir = TempDir::new().unwrap();
    isolated_cmd(&dir)
        .arg("request")
        .write_stdin(r#"{"type": "explode"}"#)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid request"));
}

#[test]
fn test_batch_rejects_missing_file() {
    let dir = TempDir::new().unwrap();
    isolated_cmd(&dir)
        .arg("batch")
        .arg(dir.path().join("does-not-exist.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read batch file"));
}

#[test]
fn test_batch_of_zero_items_succeeds_offline() {
    let dir = TempDir::new().unwrap();
    let batch = dir.path().join("batch.json");
    std::fs::write(&batch, "[]").unwrap();

    isolated_cmd(&dir)
        .arg("batch")
        .arg(&batch)
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"type\": \"batch\""));
}
