//! End-to-end CLI tests: index a small tree, then query it back.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn write_file(dir: &Path, name: &str, contents: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
    fs::write(&path, contents).expect("write source file");
}

fn canopy() -> Command {
    Command::cargo_bin("canopy").expect("binary")
}

fn sample_repo() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    write_file(
        dir.path(),
        "lib.go",
        "package main\n\nfunc Helper() string { return \"hello\" }\n",
    );
    write_file(
        dir.path(),
        "main.go",
        "package main\n\nfunc main() { Helper() }\n",
    );
    dir
}

#[test]
fn index_then_list_symbols() {
    let repo = sample_repo();
    let db = repo.path().join("index.db");

    canopy()
        .args(["index"])
        .arg(repo.path())
        .arg("--db")
        .arg(&db)
        .arg("--serial")
        .assert()
        .success()
        .stdout(predicate::str::contains("indexed 2 of 2 files"));

    canopy()
        .args(["symbols", "--db"])
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("Helper"))
        .stdout(predicate::str::contains("total: "));
}

#[test]
fn json_output_is_machine_readable() {
    let repo = sample_repo();
    let db = repo.path().join("index.db");

    canopy()
        .args(["index"])
        .arg(repo.path())
        .arg("--db")
        .arg(&db)
        .assert()
        .success();

    let output = canopy()
        .args(["search", "Helper", "--format", "json", "--db"])
        .arg(&db)
        .output()
        .expect("run search");
    assert!(output.status.success());

    let page: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("valid JSON output");
    assert_eq!(page["total_count"], 1);
    assert_eq!(page["items"][0]["name"], "Helper");
    assert_eq!(page["items"][0]["ref_count"], 1);
}

#[test]
fn unknown_kind_filter_is_rejected() {
    let repo = sample_repo();
    let db = repo.path().join("index.db");

    canopy()
        .args(["index"])
        .arg(repo.path())
        .arg("--db")
        .arg(&db)
        .assert()
        .success();

    canopy()
        .args(["symbols", "--kind", "gadget", "--db"])
        .arg(&db)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown symbol kind"));
}

#[test]
fn negative_offset_clamps_to_zero() {
    let repo = sample_repo();
    let db = repo.path().join("index.db");

    canopy()
        .args(["index"])
        .arg(repo.path())
        .arg("--db")
        .arg(&db)
        .assert()
        .success();

    canopy()
        .args(["symbols", "--offset", "-5", "--db"])
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("Helper"));
}

#[test]
fn cycles_command_reports_package_cycles() {
    let dir = TempDir::new().expect("tempdir");
    write_file(
        dir.path(),
        "a/a.go",
        "package a\n\nimport \"app/b\"\n\nfunc A() {}\n",
    );
    write_file(
        dir.path(),
        "b/b.go",
        "package b\n\nimport \"app/a\"\n\nfunc B() {}\n",
    );
    let db = dir.path().join("index.db");

    canopy()
        .args(["index"])
        .arg(dir.path())
        .arg("--db")
        .arg(&db)
        .assert()
        .success();

    canopy()
        .args(["cycles", "--db"])
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("a -> b -> a"));
}

#[test]
fn lookup_finds_definitions_across_files() {
    let repo = sample_repo();
    let db = repo.path().join("index.db");

    canopy()
        .args(["index"])
        .arg(repo.path())
        .arg("--db")
        .arg(&db)
        .assert()
        .success();

    let main_path = repo.path().join("main.go");
    canopy()
        .args(["lookup"])
        .arg(&main_path)
        .args(["2", "14", "--what", "definition", "--db"])
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("lib.go:2:"));
}
