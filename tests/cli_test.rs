//! End-to-end tests of the `lmc` binary.
//!
//! Every test runs with `LMC_HOME` pointing at a fresh temp directory and
//! the provider key variables cleared, so nothing touches the real config
//! or the network.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

mod common;

use common::logger::TestLogger;

const CLEARED_ENV: &[&str] = &[
    "LMC_CONFIG",
    "LMC_FORMAT",
    "LMC_TIMEOUT",
    "LMC_MAX_RETRIES",
    "LMC_LOG",
    "LMC_LOG_FORMAT",
    "LMC_LOG_FILE",
    "RUST_LOG",
    "OPENROUTER_API_KEY",
    "TAVILY_API_KEY",
    "PERPLEXITY_API_KEY",
    "BRAVE_API_KEY",
    "EXA_API_KEY",
];

#[allow(deprecated)]
fn lmc(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("lmc").expect("binary built");
    cmd.env("LMC_HOME", home.path()).env("NO_COLOR", "1");
    for key in CLEARED_ENV {
        cmd.env_remove(key);
    }
    cmd
}

fn home() -> TempDir {
    tempfile::tempdir().expect("temp dir")
}

#[test]
fn help_lists_commands() {
    let log = TestLogger::new("help_lists_commands");
    let home = home();
    lmc(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("compare"))
        .stdout(predicate::str::contains("search"))
        .stdout(predicate::str::contains("sessions"));
    log.finish_ok();
}

#[test]
fn no_command_prints_quickstart() {
    let home = home();
    lmc(&home)
        .assert()
        .success()
        .stdout(predicate::str::contains("QUICK START"));
}

#[test]
fn unknown_command_is_rejected() {
    let home = home();
    lmc(&home)
        .arg("notacommand")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized").or(predicate::str::contains("error")));
}

#[test]
fn prompts_list_shows_built_in_categories() {
    let log = TestLogger::new("prompts_list_shows_built_in_categories");
    let home = home();
    lmc(&home)
        .args(["prompts", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("writing"))
        .stdout(predicate::str::contains("seo"))
        .stdout(predicate::str::contains("coding"))
        .stdout(predicate::str::contains("other"));
    log.finish_ok();
}

#[test]
fn prompts_set_then_show_in_json() {
    let home = home();
    lmc(&home)
        .args(["prompts", "set", "legal", "You summarize contracts."])
        .assert()
        .success();

    let output = lmc(&home)
        .args(["--json", "prompts", "show", "legal"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(json["schemaVersion"], "lmc.v1");
    assert_eq!(json["data"]["prompt"], "You summarize contracts.");
}

#[test]
fn built_in_category_cannot_be_deleted() {
    let home = home();
    lmc(&home)
        .args(["prompts", "delete", "seo"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("built-in"));
}

#[test]
fn sessions_list_is_empty_on_fresh_home() {
    let home = home();
    lmc(&home)
        .args(["sessions", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No saved sessions"));

    let output = lmc(&home)
        .args(["--json", "sessions", "list"])
        .output()
        .expect("run");
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(json["data"], serde_json::json!([]));
}

#[test]
fn unknown_session_id_fails() {
    let log = TestLogger::new("unknown_session_id_fails");
    let home = home();
    lmc(&home)
        .args(["sessions", "show", "12345"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("session not found: 12345"));
    log.finish_ok();
}

#[test]
fn keys_set_then_show_masks_value() {
    let log = TestLogger::new("keys_set_then_show_masks_value");
    let home = home();

    log.phase("set");
    lmc(&home)
        .args(["keys", "set", "openrouter", "sk-or-v1-abcdef123456"])
        .assert()
        .success()
        .stdout(predicate::str::contains("********3456"))
        .stdout(predicate::str::contains("sk-or-v1-abcdef123456").not());

    log.phase("show");
    let output = lmc(&home)
        .args(["--json", "keys", "show"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    let entries = json["data"].as_array().expect("array");
    let openrouter = entries
        .iter()
        .find(|e| e["provider"] == "openrouter")
        .expect("openrouter entry");
    assert_eq!(openrouter["configured"], true);
    assert_eq!(openrouter["source"], "file");
    assert_eq!(openrouter["masked"], "********3456");
    let exa = entries.iter().find(|e| e["provider"] == "exa").expect("exa entry");
    assert_eq!(exa["configured"], false);
    log.finish_ok();
}

#[test]
fn keys_set_reads_value_from_stdin() {
    let home = home();
    lmc(&home)
        .args(["keys", "set", "brave"])
        .write_stdin("brave-key-from-stdin\n")
        .assert()
        .success();

    lmc(&home)
        .args(["keys", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("brave").and(predicate::str::contains("configured")));
}

#[test]
fn keys_set_rejects_unknown_provider() {
    let home = home();
    lmc(&home)
        .args(["keys", "set", "bing", "key"])
        .assert()
        .failure()
        .code(3);
}

#[test]
fn search_without_keys_reports_warnings() {
    let home = home();
    let output = lmc(&home)
        .args(["--json", "search", "rust", "-p", "tavily"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    let warnings = json["errors"].as_array().expect("warnings");
    assert!(warnings.iter().any(|w| w == "Tavily API key not configured"), "{json}");
}

#[test]
fn compare_rejects_five_models() {
    let home = home();
    lmc(&home)
        .args([
            "compare", "-m", "ollama:a", "-m", "ollama:b", "-m", "ollama:c", "-m", "ollama:d",
            "-m", "ollama:e", "hello",
        ])
        .assert()
        .failure()
        .code(3);
}

#[test]
fn completions_generate_for_bash() {
    let home = home();
    lmc(&home)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("lmc"));
}

#[test]
fn invalid_config_is_a_parse_error() {
    let home = home();
    let config_dir = home.path().join("config");
    std::fs::create_dir_all(&config_dir).expect("mkdir");
    std::fs::write(config_dir.join("config.toml"), "[general\nbroken").expect("write");

    lmc(&home)
        .args(["sessions", "list"])
        .assert()
        .failure()
        .code(3);
}

#[test]
fn json_logs_go_to_log_file() {
    let log = TestLogger::new("json_logs_go_to_log_file");
    let home = home();
    let log_file = home.path().join("lmc.log");

    lmc(&home)
        .env("LMC_LOG_FILE", &log_file)
        .args(["--json-output", "--log-level", "info", "keys", "set", "exa", "exa-key-123456789"])
        .assert()
        .success();

    let content = std::fs::read_to_string(&log_file).expect("log file written");
    let line = content
        .lines()
        .find(|l| l.contains("Stored API key"))
        .expect("key storage is logged");
    let entry: serde_json::Value = serde_json::from_str(line).expect("json log line");
    assert_eq!(entry["level"], "INFO");
    assert!(!content.contains("exa-key-123456789"));
    log.finish_ok();
}
