use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

const VALID: &str = r#"
agents:
  - name: prospector
    description: Finds prospects
    plugin_type: prospectfinder
    mcp_port: 8001
  - name: chat
    description: General assistant
teams:
  - name: growth
    members: [prospector, chat]
"#;

const CONFLICTING_PORTS: &str = r#"
agents:
  - name: prospector
    plugin_type: prospectfinder
    mcp_port: 8001
  - name: poster
    plugin_type: xtwitter
    mcp_port: 8001
"#;

const MANIFEST: &str = r#"
name: egile-prospectfinder
capabilities:
  - capability_type: prospectfinder
    command: prospect-server
    args: ["--port", "{port}"]
"#;

fn hub_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("hub"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env_remove("AGENTS_CONFIG_FILE")
        .env_remove("MCP_HOST");
    cmd
}

fn write_config(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("agents.yaml");
    fs::write(&path, contents).expect("write config");
    path
}

// ---------------------------------------------------------------------------
// 1. validate
// ---------------------------------------------------------------------------

#[test]
fn validate_lists_units_and_groups() {
    let home = TempDir::new().expect("home");
    let path = write_config(&home, VALID);

    hub_cmd(home.path())
        .args(["validate", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(contains("prospector"))
        .stdout(contains("localhost:8001"))
        .stdout(contains("growth"))
        .stdout(contains("prospector, chat"));
}

#[test]
fn validate_reads_config_file_from_env() {
    let home = TempDir::new().expect("home");
    let path = write_config(&home, VALID);

    hub_cmd(home.path())
        .arg("validate")
        .env("AGENTS_CONFIG_FILE", &path)
        .assert()
        .success()
        .stdout(contains("growth"));
}

#[test]
fn validate_reports_endpoint_conflict() {
    let home = TempDir::new().expect("home");
    let path = write_config(&home, CONFLICTING_PORTS);

    hub_cmd(home.path())
        .args(["validate", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stdout(contains("8001"))
        .stdout(contains("prospector, poster"))
        .stderr(contains("is invalid"));
}

#[test]
fn validate_json_shapes() {
    let home = TempDir::new().expect("home");
    let valid = write_config(&home, VALID);

    let output = hub_cmd(home.path())
        .args(["validate", "--json", "--config"])
        .arg(&valid)
        .output()
        .expect("run hub");
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(json["valid"], true);
    assert_eq!(json["units"].as_array().map(Vec::len), Some(2));
    assert_eq!(json["units"][0]["endpoint"]["port"], 8001);
    assert_eq!(json["groups"][0]["name"], "growth");

    let invalid = write_config(&home, CONFLICTING_PORTS);
    let output = hub_cmd(home.path())
        .args(["validate", "--json", "--config"])
        .arg(&invalid)
        .output()
        .expect("run hub");
    assert!(!output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(json["valid"], false);
    assert_eq!(json["issues"].as_array().map(Vec::len), Some(1));
}

#[test]
fn validate_missing_file_fails() {
    let home = TempDir::new().expect("home");

    hub_cmd(home.path())
        .args(["validate", "--config"])
        .arg(home.path().join("absent.yaml"))
        .assert()
        .failure()
        .stderr(contains("not found"));
}

// ---------------------------------------------------------------------------
// 2. providers
// ---------------------------------------------------------------------------

#[test]
fn providers_with_no_manifests() {
    let home = TempDir::new().expect("home");

    hub_cmd(home.path())
        .arg("providers")
        .assert()
        .success()
        .stdout(contains("No provider manifests"));
}

#[test]
fn providers_lists_default_directory() {
    let home = TempDir::new().expect("home");
    let dir = home.path().join(".hub").join("providers");
    fs::create_dir_all(&dir).expect("mkdir");
    fs::write(dir.join("prospectfinder.yaml"), MANIFEST).expect("write manifest");

    hub_cmd(home.path())
        .arg("providers")
        .assert()
        .success()
        .stdout(contains("egile-prospectfinder"))
        .stdout(contains("prospectfinder"));
}

#[test]
fn providers_json_does_not_load_anything() {
    let home = TempDir::new().expect("home");
    let dir = TempDir::new().expect("providers");
    fs::write(dir.path().join("prospectfinder.yaml"), MANIFEST).expect("write manifest");

    let output = hub_cmd(home.path())
        .args(["providers", "--json", "--dir"])
        .arg(dir.path())
        .output()
        .expect("run hub");
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(json[0]["package"], "egile-prospectfinder");
    assert_eq!(json[0]["capability_types"][0], "prospectfinder");
    assert_eq!(json[0]["loaded"].as_array().map(Vec::len), Some(0));
}

// ---------------------------------------------------------------------------
// 3. run
// ---------------------------------------------------------------------------

#[test]
fn run_fails_fast_on_unknown_capability_type() {
    let home = TempDir::new().expect("home");
    let path = write_config(&home, VALID);
    let empty = TempDir::new().expect("providers");

    hub_cmd(home.path())
        .args(["run", "--config"])
        .arg(&path)
        .arg("--providers")
        .arg(empty.path())
        .assert()
        .failure()
        .stderr(contains("hub startup failed"))
        .stderr(contains("prospectfinder"))
        .stdout(contains("hub running").not());
}
