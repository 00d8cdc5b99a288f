use std::fs;

use harvester_engine::{ensure_output_dir, OutputTarget, PersistError};
use tempfile::TempDir;

#[test]
fn creates_missing_output_dir() {
    let temp = TempDir::new().unwrap();
    let nested = temp.path().join("exports").join("2024");
    assert!(!nested.exists());

    ensure_output_dir(&nested).unwrap();
    assert!(nested.is_dir());
}

#[test]
fn rejects_file_as_output_dir() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("taken");
    fs::write(&file, "x").unwrap();

    assert!(matches!(
        ensure_output_dir(&file),
        Err(PersistError::OutputDir { .. })
    ));
}

#[test]
fn rewrite_replaces_previous_table() {
    let temp = TempDir::new().unwrap();
    let target = OutputTarget::from_path(&temp.path().join("records.csv")).unwrap();

    let first = target.write_table("id\n1\n").unwrap();
    assert_eq!(fs::read_to_string(&first).unwrap(), "id\n1\n");

    let second = target.write_table(b"id\n2\n").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&second).unwrap(), "id\n2\n");

    // only the final file remains; temp files were renamed away
    let entries = fs::read_dir(temp.path()).unwrap().count();
    assert_eq!(entries, 1);
}

#[test]
fn manifest_is_written_beside_the_table() {
    let temp = TempDir::new().unwrap();
    let target = OutputTarget::from_path(&temp.path().join("out").join("oai.csv")).unwrap();

    target.write_table("id\n").unwrap();
    let manifest = target.write_manifest("{}").unwrap();

    assert_eq!(manifest, temp.path().join("out").join("oai.manifest.json"));
    assert_eq!(manifest, target.manifest_path());
    assert!(temp.path().join("out").join("oai.csv").is_file());
}

#[test]
fn no_partial_file_on_error() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let target = OutputTarget::from_path(&file_path.join("records.csv")).unwrap();
    assert!(target.write_table("data").is_err());
    assert!(!temp.path().join("records.csv").exists());
}
