use serde_json::json;
use std::path::Path;
use std::process::Command;

fn write_spec(dir: &Path, doc: &serde_json::Value) -> std::path::PathBuf {
    let path = dir.join("spec.json");
    std::fs::write(&path, serde_json::to_string_pretty(doc).expect("serialize"))
        .expect("write spec");
    path
}

fn bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_specpipe"));
    cmd.env("RUST_LOG", "error");
    cmd
}

#[test]
fn run_prints_result_json() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let spec = write_spec(
        dir.path(),
        &json!({
            "name": "words",
            "interval": 2,
            "command": ["echo", "apple banana apple"],
            "filter": { "pattern": "(?<w>[a-z]+)" },
            "split": { "key": "w" },
            "apply": { "w": "count" }
        }),
    );

    let output = bin()
        .arg("run")
        .arg("--spec")
        .arg(&spec)
        .output()
        .expect("run specpipe");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let result: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json on stdout");
    assert_eq!(
        result,
        json!({
            "name": "words",
            "interval": 2,
            "result": { "apple": { "w": 2 }, "banana": { "w": 1 } }
        })
    );
}

#[test]
fn validate_rejects_unknown_transform() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let spec = write_spec(
        dir.path(),
        &json!({
            "name": "bad",
            "interval": 2,
            "command": ["true"],
            "filter": { "pattern": "(?<w>\\w+)" },
            "apply": { "w": "__import__('os')" }
        }),
    );

    let output = bin()
        .arg("validate")
        .arg("--spec")
        .arg(&spec)
        .output()
        .expect("run specpipe");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown transform"));
}

#[test]
fn watch_keeps_going_after_a_failed_run() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let spec = write_spec(
        dir.path(),
        &json!({
            "name": "flaky",
            "interval": 0,
            "command": ["false"],
            "filter": { "pattern": "x" },
            "apply": {}
        }),
    );

    let output = bin()
        .arg("watch")
        .arg("--spec")
        .arg(&spec)
        .arg("--count")
        .arg("2")
        .output()
        .expect("run specpipe");
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}
