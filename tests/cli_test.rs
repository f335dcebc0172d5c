use line_anchor::{format_anchor, line_hash};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::Command;

/// Get the path to the line-anchor binary
fn bin_path() -> PathBuf {
    // During tests, CARGO_BIN_EXE_line-anchor provides the path to the binary
    PathBuf::from(env!("CARGO_BIN_EXE_line-anchor"))
}

fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_tagged_read_shows_distinct_anchors() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_file(&dir, "sample.txt", "func f() {\n  return 1\n}\n");

    let output = Command::new(bin_path())
        .args(["read", "--file", file.to_str().unwrap(), "--anchors"])
        .output()
        .expect("Failed to execute binary");

    assert!(
        output.status.success(),
        "Binary failed: {:?}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let anchors: Vec<&str> = stdout
        .lines()
        .map(|line| line.split_once('|').expect("missing anchor column").0)
        .collect();

    assert_eq!(anchors.len(), 3);
    assert_eq!(anchors[0], format_anchor(line_hash("func f() {")));
    assert_eq!(anchors[1], format_anchor(line_hash("  return 1")));
    assert_eq!(anchors[2], format_anchor(line_hash("}")));
    // All three must differ for the anchors to be addressable.
    assert_ne!(anchors[0], anchors[1]);
    assert_ne!(anchors[1], anchors[2]);
    assert_ne!(anchors[0], anchors[2]);
}

#[test]
fn test_plain_read_has_no_anchor_column() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_file(&dir, "sample.txt", "alpha\nbeta\n");

    let output = Command::new(bin_path())
        .args(["read", "--file", file.to_str().unwrap()])
        .output()
        .expect("Failed to execute binary");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout, "alpha\nbeta\n");
}

#[test]
fn test_read_json_reports_truncation() {
    let dir = tempfile::tempdir().unwrap();
    let content: String = (1..=10).map(|i| format!("line {}\n", i)).collect();
    let file = write_file(&dir, "long.txt", &content);

    let output = Command::new(bin_path())
        .args([
            "read",
            "--file",
            file.to_str().unwrap(),
            "--limit",
            "4",
            "--json",
        ])
        .output()
        .expect("Failed to execute binary");

    assert!(output.status.success());
    let response: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("invalid JSON response");

    assert_eq!(response["success"], true);
    assert_eq!(response["lines_shown"], 4);
    // A --limit below the file length is a window, not a ceiling cut;
    // lines 5..10 remain reachable via --start.
    assert_eq!(response["text"], "line 1\nline 2\nline 3\nline 4");
}

#[test]
fn test_read_window_with_start() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_file(&dir, "sample.txt", "a\nb\nc\nd\n");

    let output = Command::new(bin_path())
        .args([
            "read",
            "--file",
            file.to_str().unwrap(),
            "--start",
            "3",
            "--limit",
            "2",
        ])
        .output()
        .expect("Failed to execute binary");

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "c\nd\n");
}

#[test]
fn test_read_start_zero_clamps_to_line_one() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_file(&dir, "sample.txt", "a\nb\nc\nd\n");

    let output = Command::new(bin_path())
        .args([
            "read",
            "--file",
            file.to_str().unwrap(),
            "--start",
            "0",
            "--limit",
            "2",
            "--json",
        ])
        .output()
        .expect("Failed to execute binary");

    assert!(output.status.success());
    let response: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("invalid JSON response");

    // Start 0 reads from line 1; resuming must continue at line 3, not
    // re-show line 2.
    assert_eq!(response["text"], "a\nb");
    assert_eq!(response["truncated"], true);
    assert_eq!(response["next_offset"], 3);
}

#[test]
fn test_edit_replace_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_file(&dir, "code.txt", "func f() {\n  return 1\n}\n");

    let request = serde_json::json!({
        "path": file.to_str().unwrap(),
        "start_anchor": format_anchor(line_hash("  return 1")),
        "content": "  return 2",
    });
    let request_file = write_file(&dir, "request.json", &request.to_string());

    let output = Command::new(bin_path())
        .args(["edit", "--request", request_file.to_str().unwrap()])
        .output()
        .expect("Failed to execute binary");

    assert!(
        output.status.success(),
        "Binary failed: {:?}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("replace:"), "Unexpected output: {}", stdout);
    assert!(stdout.contains("-   return 1"), "missing removed row: {}", stdout);
    assert!(stdout.contains("+   return 2"), "missing added row: {}", stdout);
    assert!(
        stdout.contains(&format_anchor(line_hash("  return 2"))),
        "missing continuation anchor: {}",
        stdout
    );

    assert_eq!(
        fs::read_to_string(&file).unwrap(),
        "func f() {\n  return 2\n}\n"
    );
}

#[test]
fn test_edit_stale_anchor_fails_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_file(&dir, "code.txt", "alpha\nbeta\n");

    let request = serde_json::json!({
        "path": file.to_str().unwrap(),
        "start_anchor": format_anchor(line_hash("line that is gone")),
        "content": "replacement",
    });
    let request_file = write_file(&dir, "request.json", &request.to_string());

    let output = Command::new(bin_path())
        .args(["edit", "--request", request_file.to_str().unwrap()])
        .output()
        .expect("Failed to execute binary");

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("re-read"), "Unexpected output: {}", stdout);
    // The file is untouched.
    assert_eq!(fs::read_to_string(&file).unwrap(), "alpha\nbeta\n");
}

#[test]
fn test_edit_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_file(&dir, "code.txt", "one\ntwo\nthree\n");

    let request = serde_json::json!({
        "path": file.to_str().unwrap(),
        "start_anchor": format_anchor(line_hash("two")),
        "execution_id": "test-run-1",
    });
    let request_file = write_file(&dir, "request.json", &request.to_string());

    let output = Command::new(bin_path())
        .args([
            "edit",
            "--request",
            request_file.to_str().unwrap(),
            "--json",
        ])
        .output()
        .expect("Failed to execute binary");

    assert!(output.status.success());
    let response: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("invalid JSON response");

    assert_eq!(response["success"], true);
    assert_eq!(response["execution_id"], "test-run-1");
    assert_eq!(response["operation"], "delete");
    assert_eq!(response["first_changed_line"], 2);
    assert_eq!(response["lines_added"], 0);
    assert_eq!(response["lines_removed"], 1);
    assert!(response["checksum"].is_string());

    assert_eq!(fs::read_to_string(&file).unwrap(), "one\nthree\n");
}

#[test]
fn test_edit_noop_reports_no_changes() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_file(&dir, "code.txt", "one\ntwo\n");

    let request = serde_json::json!({
        "path": file.to_str().unwrap(),
        "start_anchor": format_anchor(line_hash("two")),
        "content": "two",
    });
    let request_file = write_file(&dir, "request.json", &request.to_string());

    let output = Command::new(bin_path())
        .args(["edit", "--request", request_file.to_str().unwrap()])
        .output()
        .expect("Failed to execute binary");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No changes"), "Unexpected output: {}", stdout);
}
