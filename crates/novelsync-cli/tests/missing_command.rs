use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[allow(deprecated)]
fn get_novelsync_bin() -> PathBuf {
    assert_cmd::cargo::cargo_bin("novelsync")
}

const STORE: &str = r#"{
  "next_id": 3,
  "titles": {
    "1": {
      "id": 1,
      "name": "Saintess",
      "source_url": "https://source.example/series/saintess",
      "catalog_url": "https://catalog.example/series/saintess/",
      "group_name": "Fenrir Realm",
      "source_chapters": [
        {"volume": null, "chapter": 1},
        {"volume": 2, "chapter": 3}
      ],
      "catalog_chapters": [
        {"volume": null, "chapter": 1}
      ]
    },
    "2": {
      "id": 2,
      "name": "Caught Up",
      "source_url": "https://source.example/series/caught-up",
      "catalog_url": "https://catalog.example/series/caught-up/",
      "group_name": "Fenrir Realm",
      "source_chapters": [{"volume": null, "chapter": 5}],
      "catalog_chapters": [{"volume": 0, "chapter": 5}]
    }
  }
}"#;

fn write_store(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("titles.json");
    std::fs::write(&path, STORE).unwrap();
    path
}

fn novelsync(store: &Path) -> Command {
    let mut cmd = Command::new(get_novelsync_bin());
    cmd.arg("--store").arg(store);
    cmd
}

#[test]
fn test_missing_json_report() {
    let dir = TempDir::new().unwrap();
    let store = write_store(&dir);

    let output = novelsync(&store)
        .args(["--format", "json", "missing", "1"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        report,
        serde_json::json!({"count": 1, "missing": [{"vol": 2, "ch": 3}]})
    );
}

#[test]
fn test_missing_pretty_report() {
    let dir = TempDir::new().unwrap();
    let store = write_store(&dir);

    novelsync(&store)
        .args(["missing", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Missing on catalog: 1"))
        .stdout(predicate::str::contains("Vol 2 Ch 3"));
}

#[test]
fn test_missing_treats_volume_zero_as_absent() {
    let dir = TempDir::new().unwrap();
    let store = write_store(&dir);

    novelsync(&store)
        .args(["missing", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Catalog is up to date"));
}

#[test]
fn test_missing_unknown_title_fails() {
    let dir = TempDir::new().unwrap();
    let store = write_store(&dir);

    novelsync(&store)
        .args(["missing", "42"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Title not found: 42"));
}
