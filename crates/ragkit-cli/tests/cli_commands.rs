#![allow(deprecated)] // cargo_bin is deprecated but still functional

//! Commands that run without an inference server
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

// -- Helpers --

struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    fn root(&self) -> PathBuf {
        self.temp_dir.path().to_path_buf()
    }

    fn config_path(&self) -> PathBuf {
        self.root().join(".ragkit").join("config.toml")
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("ragkit").unwrap();
        cmd.current_dir(self.root())
            .env_remove("RUST_LOG")
            .env_remove("TAVILY_SEARCH_API_KEY")
            .env_remove("BRAVE_SEARCH_API_KEY")
            .env_remove("RAGKIT_SERVER__HOST")
            .env_remove("RAGKIT_SERVER__PORT")
            .env_remove("RAGKIT_SEARCH__MAX_RESULTS");
        cmd
    }
}

// -- Tests --

#[test]
fn test_help_lists_commands() {
    let ctx = TestContext::new();
    ctx.cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("multi-rag"))
        .stdout(predicate::str::contains("rag-metadata"))
        .stdout(predicate::str::contains("chunking"))
        .stdout(predicate::str::contains("route"))
        .stdout(predicate::str::contains("math"));
}

#[test]
fn test_route_dry_run_without_web_search() {
    let ctx = TestContext::new();
    ctx.cmd()
        .args(["route", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[route] general <- Find a recent"))
        .stdout(predicate::str::contains("[route] math <- Compute 45 * 12 / 6."))
        .stdout(predicate::str::contains("[route] finance <- What was the closing price"));
}

#[test]
fn test_route_dry_run_with_web_search() {
    let ctx = TestContext::new();
    ctx.cmd()
        .args(["route", "--dry-run", "--web-search"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[route] research <- Find a recent"));
}

#[test]
fn test_route_dry_run_with_api_key_in_environment() {
    let ctx = TestContext::new();
    ctx.cmd()
        .env("TAVILY_SEARCH_API_KEY", "tvly-test")
        .args(["route", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[route] research <- Find a recent"));
}

#[test]
fn test_route_custom_task() {
    let ctx = TestContext::new();
    ctx.cmd()
        .args(["route", "--dry-run", "--task", "Please calculate the total"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[route] math <- Please calculate the total"))
        .stdout(predicate::str::contains("[task]").not());
}

#[test]
fn test_config_init_writes_defaults() {
    let ctx = TestContext::new();
    ctx.cmd()
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote default configuration"));

    let content = std::fs::read_to_string(ctx.config_path()).unwrap();
    assert!(content.contains("port = 8321"));
    assert!(content.contains("max_chunk_size_tokens = 512"));
}

#[test]
fn test_config_init_refuses_to_overwrite() {
    let ctx = TestContext::new();
    ctx.cmd().args(["config", "init"]).assert().success();
    ctx.cmd()
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
    ctx.cmd()
        .args(["config", "init", "--force"])
        .assert()
        .success();
}

#[test]
fn test_config_init_force_replaces_malformed_file() {
    let ctx = TestContext::new();
    std::fs::create_dir_all(ctx.config_path().parent().unwrap()).unwrap();
    std::fs::write(ctx.config_path(), "[server\nport = \"not a port\"\n").unwrap();

    ctx.cmd().args(["config", "show"]).assert().failure();
    ctx.cmd()
        .args(["config", "init", "--force"])
        .assert()
        .success();
    ctx.cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("port = 8321"));
}

#[test]
fn test_zero_poll_interval_is_rejected() {
    let ctx = TestContext::new();
    std::fs::create_dir_all(ctx.config_path().parent().unwrap()).unwrap();
    std::fs::write(ctx.config_path(), "[ingest]\npoll_interval_ms = 0\n").unwrap();

    ctx.cmd()
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("poll_interval_ms must be greater than zero"));
}

#[test]
fn test_config_show_without_file_prints_defaults() {
    let ctx = TestContext::new();
    ctx.cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("showing defaults"))
        .stdout(predicate::str::contains("host = \"localhost\""))
        .stdout(predicate::str::contains("max_results = 3"));
}

#[test]
fn test_config_show_applies_file_env_and_flags() {
    let ctx = TestContext::new();
    std::fs::create_dir_all(ctx.config_path().parent().unwrap()).unwrap();
    std::fs::write(
        ctx.config_path(),
        "[server]\nhost = \"stack.internal\"\nport = 5001\n\n[models]\nchat = \"llama3.2:3b\"\n",
    )
    .unwrap();

    ctx.cmd()
        .env("RAGKIT_SEARCH__MAX_RESULTS", "7")
        .args(["config", "show", "--port", "9000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("host = \"stack.internal\""))
        .stdout(predicate::str::contains("port = 9000"))
        .stdout(predicate::str::contains("chat = \"llama3.2:3b\""))
        .stdout(predicate::str::contains("max_results = 7"));
}

#[test]
fn test_explicit_config_path() {
    let ctx = TestContext::new();
    let path = ctx.root().join("custom.toml");
    std::fs::write(&path, "[math]\nurl = \"http://math.internal:8080\"\n").unwrap();

    ctx.cmd()
        .args(["config", "show", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("http://math.internal:8080"));
}

#[test]
fn test_health_reports_unreachable_server() {
    let ctx = TestContext::new();
    ctx.cmd()
        .args(["health", "--host", "127.0.0.1", "--port", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot reach the inference server"));
}

#[test]
fn test_math_calc_rejects_unknown_operation() {
    let ctx = TestContext::new();
    ctx.cmd()
        .args(["math", "calc", "modulo", "--a", "1", "--b", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("modulo"));
}

#[test]
fn test_search_requires_query() {
    let ctx = TestContext::new();
    ctx.cmd()
        .args(["search", "--text", "hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--query"));
}
