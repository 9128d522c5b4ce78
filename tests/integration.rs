use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn crawlctx_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_crawlctx"))
}

/// Port with nothing listening on it.
fn dead_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    // Embeddings disabled so no model is downloaded; the agent points at a
    // port nobody listens on.
    let config_content = format!(
        r#"[db]
path = "{}/data/vectors.sqlite"

[server]
bind = "127.0.0.1:0"

[embedding]
provider = "disabled"

[agent]
api_url = "http://127.0.0.1:{}"
status_timeout_secs = 2
"#,
        root.display(),
        dead_port()
    );

    let config_path = config_dir.join("crawl.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_crawlctx(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = crawlctx_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run crawlctx binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_creates_database() {
    let (tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_crawlctx(&config, &["init"]);
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.contains("Database initialized"));
    assert!(tmp.path().join("data/vectors.sqlite").exists());

    // Idempotent.
    let (_, stderr, success) = run_crawlctx(&config, &["init"]);
    assert!(success, "second init failed: {}", stderr);
}

#[test]
fn test_collections_empty_store() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_crawlctx(&config, &["collections"]);
    assert!(success, "collections failed: {}", stderr);
    assert!(stdout.contains("No collections."));
}

#[test]
fn test_query_unknown_collection_fails() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, success) = run_crawlctx(&config, &["query", "missing", "anything"]);
    assert!(!success);
    assert!(stderr.contains("missing"), "stderr: {}", stderr);
}

#[test]
fn test_crawl_rejects_invalid_url() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, success) = run_crawlctx(&config, &["crawl", "not-a-url"]);
    assert!(!success);
    assert!(stderr.contains("invalid URL"), "stderr: {}", stderr);
}

#[test]
fn test_crawl_unreachable_site_reports_failure() {
    let (_tmp, config) = setup_test_env();
    let url = format!("http://127.0.0.1:{}/", dead_port());
    let (_, stderr, success) = run_crawlctx(&config, &["crawl", &url, "--max-depth", "0"]);
    assert!(!success);
    assert!(stderr.contains("failed"), "stderr: {}", stderr);
}

#[test]
fn test_agent_prompt_without_api() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_crawlctx(
        &config,
        &["agent", "prompt", "--request", "crawl the tokio tutorial"],
    );
    assert!(success, "agent prompt failed: {}", stderr);
    assert!(stdout.contains("WEBSITE CRAWLING"));
    assert!(stdout.contains("Current date and time:"));
    assert!(stdout.contains("crawl_website"));
    assert!(stdout.contains("[user] crawl the tokio tutorial"));
}

#[test]
fn test_agent_call_reports_api_failure_as_text() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_crawlctx(&config, &["agent", "call", "list_collections"]);
    assert!(success, "agent call failed: {}", stderr);
    assert!(stdout.starts_with("Failed to list collections"), "stdout: {}", stdout);
}

#[test]
fn test_agent_call_unknown_tool() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, success) = run_crawlctx(&config, &["agent", "call", "delete_everything"]);
    assert!(!success);
    assert!(stderr.contains("Unknown tool"));
    assert!(stderr.contains("query_collection"));
}

#[test]
fn test_agent_call_rejects_non_object_params() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, success) = run_crawlctx(
        &config,
        &["agent", "call", "check_crawl_status", "--params", "[1, 2]"],
    );
    assert!(!success);
    assert!(stderr.contains("JSON object"));
}

#[test]
fn test_missing_config_uses_defaults() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");
    let (stdout, stderr, success) = run_crawlctx(&missing, &["agent", "prompt"]);
    assert!(success, "agent prompt failed: {}", stderr);
    assert!(stdout.contains("Tools: crawl_website"));
}
