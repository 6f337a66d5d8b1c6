use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

use statedoc::{DocumentConfig, JournaledDocument, Value};
use tempfile::tempdir;

#[test]
fn exists_reports_false_then_true() {
    let dir = tempdir().unwrap();
    let base = dir.path().join("doc");

    Command::cargo_bin("docctl")
        .unwrap()
        .args(["exists", base.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("false"));

    let config = DocumentConfig::new(base.clone(), "document", 1, 4096, 2048);
    JournaledDocument::new(config, Value::empty_map())
        .unwrap()
        .close()
        .unwrap();

    Command::cargo_bin("docctl")
        .unwrap()
        .args(["exists", base.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("true"));
}

#[test]
fn dump_prints_recovered_json() {
    let dir = tempdir().unwrap();
    let base = dir.path().join("doc");
    let config = DocumentConfig::new(base.clone(), "document", 1, 4096, 2048);
    let doc = JournaledDocument::new(config, Value::empty_map()).unwrap();
    doc.add_command("name", Some(Value::String("alice".into()))).unwrap();
    doc.close().unwrap();

    Command::cargo_bin("docctl")
        .unwrap()
        .args(["dump", base.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("alice"));
}

#[test]
fn dump_of_missing_document_fails_loudly() {
    let dir = tempdir().unwrap();
    let base = dir.path().join("doc");

    Command::cargo_bin("docctl")
        .unwrap()
        .args(["dump", base.to_str().unwrap()])
        .assert()
        .failure();
}
