//! Integration tests for the command-line interface

mod common;

use common::*;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn rnv8(args: &[&str], cwd: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_rnv8-patcher"))
        .args(args)
        .current_dir(cwd)
        .env_remove("RNV8_PROJECT")
        .env("NO_COLOR", "1")
        .output()
        .unwrap()
}

#[test]
fn test_apply_help() {
    let dir = tempfile::tempdir().unwrap();
    let output = rnv8(&["apply", "--help"], dir.path());

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--project"));
    assert!(stdout.contains("--dry-run"));
    assert!(stdout.contains("--strict-hosts"));
}

#[test]
fn test_apply_auto_detects_project() {
    let project = scaffold_project();
    let root = project.path();

    let output = rnv8(&["apply"], &root.join("android/app"));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        output.status.success(),
        "stdout: {stdout}\nstderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(stdout.contains("Auto-detected project"));
    assert!(stdout.contains("6 applied"));
    assert!(read(root, APP_GRADLE).contains("exclude \"**/libjsc.so\""));
}

#[test]
fn test_dry_run_writes_nothing() {
    let project = scaffold_project();
    let root = project.path();
    let before = snapshot(root);

    let output = rnv8(
        &["apply", "--project", root.to_str().unwrap(), "--dry-run", "--diff"],
        root,
    );
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("DRY RUN"));
    assert!(stdout.contains("Would apply to"));
    assert!(stdout.contains("+    implementation \"org.chromium:v8-android-jit:+\""));
    assert_eq!(snapshot(root), before);
}

#[test]
fn test_hint_only_touches_entry_script() {
    let project = scaffold_project();
    let root = project.path();

    let output = rnv8(&["apply", "--project", root.to_str().unwrap(), "--hint-only"], root);
    assert!(output.status.success());

    assert!(read(root, "App.js").contains("global._v8runtime"));
    assert_eq!(read(root, APP_GRADLE), fixture(&format!("rn063/{APP_GRADLE}")));
}

#[test]
fn test_failure_exits_nonzero_and_writes_nothing() {
    let project = scaffold_project();
    let root = project.path();
    fs::write(root.join("App.js"), "module.exports = App;\n").unwrap();
    let before = snapshot(root);

    let output = rnv8(&["apply", "--project", root.to_str().unwrap()], root);
    assert_eq!(output.status.code(), Some(1));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no anchor matched"));
    assert!(stderr.contains("No files were written."));
    assert_eq!(snapshot(root), before);
}

#[test]
fn test_status_reports_without_writing() {
    let project = scaffold_project();
    let root = project.path();
    let path = root.to_str().unwrap();

    let output = rnv8(&["status", "--project", path], root);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("6 step(s) would change the project"));
    assert_eq!(read(root, "App.js"), fixture("rn063/App.js"));

    assert!(rnv8(&["apply", "--project", path], root).status.success());

    let output = rnv8(&["status", "--project", path], root);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Project is fully patched"));
}

#[test]
fn test_project_from_environment() {
    let project = scaffold_project();
    let root = project.path();
    let elsewhere = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_rnv8-patcher"))
        .args(["apply", "--support-only"])
        .current_dir(elsewhere.path())
        .env("RNV8_PROJECT", root)
        .env("NO_COLOR", "1")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(read(root, GRADLE_PROPERTIES).contains("-XX:MaxMetaspaceSize=512m"));
    assert_eq!(read(root, "App.js"), fixture("rn063/App.js"));
}

#[test]
fn test_no_project_found() {
    let dir = tempfile::tempdir().unwrap();
    let output = rnv8(&["apply"], dir.path());
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr)
        .contains("Could not find a React Native project"));
}

#[test]
fn test_config_file_overrides_runtime_package() {
    let project = scaffold_project();
    let root = project.path();
    write(
        root,
        "rnv8-patcher.toml",
        "[options]\nruntime_package = \"v8-android-nointl\"\nincrease_heap = false\n",
    );

    let output = rnv8(&["apply", "--project", root.to_str().unwrap()], root);
    assert!(output.status.success());
    assert!(read(root, APP_GRADLE).contains("implementation \"org.chromium:v8-android-nointl:+\""));
    assert!(read(root, GRADLE_PROPERTIES).contains("# org.gradle.jvmargs"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let project = scaffold_project();
    let root = project.path();
    write(root, "rnv8-patcher.toml", "[options]\nruntime_package = \"hermes\"\n");

    let output = rnv8(&["apply", "--project", root.to_str().unwrap()], root);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("options.runtime_package"));
}

#[test]
fn test_expo_refuses_project_without_jsc() {
    let project = scaffold_project();
    let root = project.path();
    write(root, "app.json", r#"{"expo": {"jsEngine": "hermes"}}"#);
    let before = snapshot(root);

    let output = rnv8(&["expo", "--project", root.to_str().unwrap()], root);
    assert_eq!(output.status.code(), Some(1));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("android JavaScript engine"));
    assert!(stderr.contains("expo.android.jsEngine"));
    assert_eq!(snapshot(root), before);
}
