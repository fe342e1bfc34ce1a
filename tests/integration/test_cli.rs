//! CLI surface checks against the built binary.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_help_lists_both_modes() {
    Command::cargo_bin("kernelc")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("compile"))
        .stdout(predicate::str::contains("resident"));
}

#[test]
fn test_compile_requires_sdk_root() {
    Command::cargo_bin("kernelc")
        .unwrap()
        .args(["compile", "lib/m.dart", "--engine", "/engine", "--output-dill", "/out.dill"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--sdk-root"));
}

#[test]
fn test_compile_with_missing_engine_fails() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("kernelc")
        .unwrap()
        .args([
            "compile",
            "lib/m.dart",
            "--sdk-root",
            "/sdk",
            "--engine",
            dir.path().join("nonexistent").to_str().unwrap(),
            "--output-dill",
            "/out.dill",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not runnable"));
}

#[test]
fn test_unknown_target_is_rejected() {
    Command::cargo_bin("kernelc")
        .unwrap()
        .args([
            "compile",
            "lib/m.dart",
            "--sdk-root",
            "/sdk",
            "--engine",
            "/engine",
            "--output-dill",
            "/out.dill",
            "--target",
            "fuchsia",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown target model"));
}
