#![cfg(unix)]

use std::os::unix::fs::PermissionsExt as _;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

use base64::Engine as _;
use nact::{INIT_REPORT_SCHEMA_VERSION, RUNNER_MANIFEST_SCHEMA_VERSION};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_dir(prefix: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = base.join(format!("{prefix}_{pid}_{n}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn write_executable(path: &Path, contents: &str) {
    std::fs::write(path, contents).expect("write script");
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).expect("chmod script");
}

fn write_fixture(dir: &Path, build_script: &str) {
    std::fs::write(dir.join("epilogue.sh"), "run_main() { \"$1\"; }\n").expect("write harness");
    write_executable(&dir.join("buildandlink.sh"), build_script);
    std::fs::write(
        dir.join("runner.json"),
        serde_json::json!({
            "schema_version": RUNNER_MANIFEST_SCHEMA_VERSION,
            "harness": "epilogue.sh",
            "source_out": "action.src",
            "build_dir": ".",
            "build_command": "buildandlink.sh",
            "artifact": "action.bin",
            "dispatch": "run_main {entry}",
        })
        .to_string(),
    )
    .expect("write manifest");
}

#[test]
fn cli_init_builds_and_reports_ready() {
    let dir = temp_dir("nact_cli_init_ok");
    write_fixture(
        &dir,
        "#!/bin/sh\necho building action\ncp action.src action.bin\n",
    );
    std::fs::write(
        dir.join("init.json"),
        serde_json::json!({
            "value": { "code": "hello() { :; }", "main": "hello" }
        })
        .to_string(),
    )
    .expect("write init payload");

    let bin = env!("CARGO_BIN_EXE_nact-runner");
    let out = Command::new(bin)
        .arg("--config")
        .arg(dir.join("runner.json"))
        .arg("--init")
        .arg(dir.join("init.json"))
        .output()
        .expect("run nact-runner");

    assert!(
        out.status.success(),
        "status={}\nstderr={}",
        out.status,
        String::from_utf8_lossy(&out.stderr)
    );

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse report json");
    assert_eq!(
        v.get("schema_version").and_then(|s| s.as_str()),
        Some(INIT_REPORT_SCHEMA_VERSION)
    );
    assert_eq!(v.get("mode").and_then(|m| m.as_str()), Some("init"));
    assert_eq!(v.get("ok").and_then(|b| b.as_bool()), Some(true));
    assert_eq!(v.get("exit_code").and_then(|n| n.as_u64()), Some(0));
    assert_eq!(v.get("state").and_then(|s| s.as_str()), Some("ready"));
    assert_eq!(v.get("entry_point").and_then(|s| s.as_str()), Some("hello"));

    let artifact = v.get("artifact").and_then(|a| a.as_str()).expect("artifact path");
    let built = std::fs::read_to_string(artifact).expect("read artifact");
    assert!(built.contains("run_main hello"));

    let b64 = base64::engine::general_purpose::STANDARD;
    let stdout = b64
        .decode(v.get("stdout_b64").and_then(|s| s.as_str()).expect("stdout_b64"))
        .expect("decode stdout");
    assert!(String::from_utf8_lossy(&stdout).contains("building action"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn cli_init_reports_build_failure_diagnostics() {
    let dir = temp_dir("nact_cli_init_fail");
    write_fixture(
        &dir,
        "#!/bin/sh\necho 'unresolved entry point' >&2\nexit 3\n",
    );
    std::fs::write(
        dir.join("init.json"),
        serde_json::json!({
            "value": { "code": "hello() { :; }", "main": "missing" }
        })
        .to_string(),
    )
    .expect("write init payload");

    let bin = env!("CARGO_BIN_EXE_nact-runner");
    let out = Command::new(bin)
        .arg("--config")
        .arg(dir.join("runner.json"))
        .arg("--init")
        .arg(dir.join("init.json"))
        .output()
        .expect("run nact-runner");

    assert_eq!(out.status.code(), Some(1));

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse report json");
    assert_eq!(v.get("ok").and_then(|b| b.as_bool()), Some(false));
    assert_eq!(v.get("state").and_then(|s| s.as_str()), Some("failed"));
    assert_eq!(v.get("exit_status").and_then(|n| n.as_i64()), Some(3));
    assert!(v.get("artifact").is_some_and(|a| a.is_null()));

    let b64 = base64::engine::general_purpose::STANDARD;
    let stderr = b64
        .decode(v.get("stderr_b64").and_then(|s| s.as_str()).expect("stderr_b64"))
        .expect("decode stderr");
    assert!(String::from_utf8_lossy(&stderr).contains("unresolved entry point"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn cli_missing_manifest_exits_two() {
    let dir = temp_dir("nact_cli_init_noconfig");
    std::fs::write(
        dir.join("init.json"),
        serde_json::json!({ "value": { "code": "hello() { :; }" } }).to_string(),
    )
    .expect("write init payload");

    let bin = env!("CARGO_BIN_EXE_nact-runner");
    let out = Command::new(bin)
        .arg("--config")
        .arg(dir.join("absent.json"))
        .arg("--init")
        .arg(dir.join("init.json"))
        .output()
        .expect("run nact-runner");

    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("read runner manifest"));

    let _ = std::fs::remove_dir_all(&dir);
}
