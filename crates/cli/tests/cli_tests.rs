//! CLI integration tests

use std::io::Write;
use std::process::Command;

fn utilctl(args: &[&str]) -> std::process::Output {
    Command::new("cargo")
        .args(["run", "-q", "-p", "utilctl", "--"])
        .args(args)
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = utilctl(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("Utilization Filter"),
        "Should show app name"
    );
    assert!(stdout.contains("check"), "Should show check command");
    assert!(stdout.contains("filter"), "Should show filter command");
    assert!(stdout.contains("summarize"), "Should show summarize command");
    assert!(
        stdout.contains("--prometheus-url"),
        "Should show prometheus url option"
    );
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = utilctl(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("utilctl"), "Should show binary name");
}

/// Test filter subcommand help
#[test]
fn test_filter_help() {
    let output = utilctl(&["filter", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Filter help should succeed");
    assert!(stdout.contains("--pod"), "Should show pod option");
}

/// Test that check requires at least one node
#[test]
fn test_check_requires_nodes() {
    let output = utilctl(&["check"]);

    assert!(!output.status.success(), "Check without nodes should fail");
}

/// Test that an out-of-range threshold is rejected before any query
#[test]
fn test_check_rejects_invalid_threshold() {
    let output = utilctl(&["--threshold", "1.5", "check", "node-a"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Invalid threshold should fail");
    assert!(stderr.contains("threshold"), "Should mention the threshold");
}

/// Test summarize on a manifest file, JSON output
#[test]
fn test_summarize_json() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "metadata": {{ "name": "web-0" }},
            "spec": {{
                "containers": [
                    {{ "name": "a", "resources": {{ "limits": {{ "cpu": "250m" }} }} }},
                    {{ "name": "b", "resources": {{ "limits": {{ "cpu": "1", "memory": "1Gi" }} }} }}
                ]
            }}
        }}"#
    )
    .unwrap();

    let path = file.path().to_str().unwrap();
    let output = utilctl(&["--format", "json", "summarize", path]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Summarize should succeed");
    let summary: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(summary["totals"]["cpu"], 1250);
    assert_eq!(summary["totals"]["memory"], 1024 * 1024 * 1024);
}

/// Test summarize on a missing file
#[test]
fn test_summarize_missing_file() {
    let output = utilctl(&["summarize", "/nonexistent/pod.json"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Missing manifest should fail");
    assert!(stderr.contains("Failed to read pod manifest"));
}
