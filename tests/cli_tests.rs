use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::runtime::Runtime;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn slidebolt() -> Command {
    let mut cmd = Command::cargo_bin("slidebolt").unwrap();
    cmd.env_remove("SLIDEBOLT_BASE_URL")
        .env_remove("RUST_LOG")
        .env_remove("NO_COLOR");
    cmd
}

#[test]
fn test_cli_help() {
    slidebolt()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Compiler Explorer"));
}

#[test]
fn test_cli_version() {
    slidebolt()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_init_command() {
    let temp_dir = TempDir::new().unwrap();

    slidebolt()
        .arg("init")
        .arg("--output-dir")
        .arg(temp_dir.path())
        .assert()
        .success();

    let config_path = temp_dir.path().join("slidebolt.toml");
    assert!(config_path.exists());
}

#[test]
fn test_display_strips_directives() {
    slidebolt()
        .arg("display")
        .write_stdin("/// compiler=g92\n/// hide\n#include <vector>\n/// unhide\nstd::vector<int> v;\n")
        .assert()
        .success()
        .stdout("std::vector<int> v;\n");
}

#[test]
fn test_parse_prints_compile_info() {
    slidebolt()
        .arg("parse")
        .write_stdin("/// compiler=clang1600\n/// execute\nint main() {}\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"compiler\": \"clang1600\""))
        .stdout(predicate::str::contains("\"execute\": true"));
}

#[test]
fn test_link_uses_base_url_flag() {
    slidebolt()
        .args(["--base-url", "http://localhost:10240/", "link"])
        .write_stdin("int main() {}\n")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("http://localhost:10240/#"));
}

#[test]
fn test_files_lists_includes() {
    let temp_dir = TempDir::new().unwrap();
    let deck = temp_dir.path().join("index.md");
    std::fs::write(&deck, "# Deck\nFILE: intro/slides.md\nFILE: outro/slides.md\n").unwrap();

    slidebolt()
        .arg("files")
        .arg(&deck)
        .assert()
        .success()
        .stdout("intro/slides.md\noutro/slides.md\n");
}

#[test]
fn test_check_missing_deck_fails() {
    let temp_dir = TempDir::new().unwrap();

    slidebolt()
        .arg("check")
        .arg(temp_dir.path().join("missing.md"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Check failed"));
}

/// Start a Compiler Explorer stand-in that answers every compile with `body`
fn explorer_answering(body: Value) -> (Runtime, MockServer) {
    let runtime = Runtime::new().unwrap();
    let server = runtime.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;
        server
    });
    (runtime, server)
}

#[test]
fn test_compile_failure_exits_non_zero() {
    let (_runtime, server) =
        explorer_answering(json!({"code": 1, "stderr": [{"text": "error"}]}));

    slidebolt()
        .args(["--base-url", &server.uri(), "compile"])
        .write_stdin("int main() { return 0 }\n")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("code:"))
        .stderr(predicate::str::contains("output:"))
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_check_fails_when_snippet_unexpectedly_compiles() {
    let (_runtime, server) = explorer_answering(json!({"code": 0}));

    let temp_dir = TempDir::new().unwrap();
    let deck = temp_dir.path().join("index.md");
    std::fs::write(
        &deck,
        "# Deck\n\n```cpp\n/// fails=narrowing\nint x{1.5};\n```\n",
    )
    .unwrap();

    slidebolt()
        .args(["--base-url", &server.uri(), "check", "--json"])
        .arg(&deck)
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("\"status\": \"failed\""))
        .stdout(predicate::str::contains("narrowing"));
}

#[test]
fn test_no_color_disables_log_colors() {
    let long_line = format!("int x = {};\n", "1 + ".repeat(20) + "1");

    slidebolt()
        .args(["--no-color", "display"])
        .write_stdin(long_line)
        .assert()
        .success()
        .stderr(predicate::str::contains("characters (max 63)"))
        .stderr(predicate::str::contains("\u{1b}[").not());
}
