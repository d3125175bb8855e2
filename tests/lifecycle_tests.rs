//! Save/read lifecycle integration tests

use serde_json::json;
use std::fs;
use tempfile::TempDir;

use strata_store::{
    SaveRequest, SidecarFormat, Store, StoreError, StoreOptions, VersionSpec,
};

fn open_store(dir: &TempDir) -> Store {
    Store::open(dir.path(), StoreOptions::default()).unwrap()
}

#[test]
fn test_round_trip_preserves_value() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);

    let value = json!({
        "rows": [{"id": 1, "name": "a"}, {"id": 2, "name": "b"}],
        "columns": ["id", "name"]
    });
    store.save("tables/t.json", &value, SaveRequest::default()).unwrap();

    assert_eq!(store.read("tables/t.json", &VersionSpec::Latest).unwrap(), value);
}

#[test]
fn test_idempotent_save_keeps_latest_pointer() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);

    let request = || SaveRequest::default().with_code("build()", "pipeline.R");
    let first = store.save("a.json", &json!({"x": 1}), request()).unwrap();
    let second = store.save("a.json", &json!({"x": 1}), request()).unwrap();

    assert!(second.was_skipped());
    assert_eq!(store.versions("a.json").len(), 1);
    assert_eq!(
        store.catalog().latest(&store.normalized("a.json")).unwrap().version_id,
        first.version_id()
    );
}

#[test]
fn test_each_content_change_is_a_new_version() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);

    let mut ids = Vec::new();
    for i in 0..4 {
        let outcome = store
            .save("a.json", &json!({"x": i}), SaveRequest::default())
            .unwrap();
        ids.push(outcome.version_id().to_string());
    }

    let mut unique = ids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 4);

    // History reads back each distinct snapshot.
    for (offset, i) in (0..4).rev().enumerate() {
        let value = store.read("a.json", &VersionSpec::Offset(offset)).unwrap();
        assert_eq!(value["x"], i);
    }
}

#[test]
fn test_attribute_order_does_not_create_versions() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);

    store
        .save("a.json", &json!({"cols": ["x"], "rows": [1]}), SaveRequest::default())
        .unwrap();
    let outcome = store
        .save("a.json", &json!({"rows": [1], "cols": ["x"]}), SaveRequest::default())
        .unwrap();

    assert!(outcome.was_skipped());
}

#[test]
fn test_sidecar_reflects_latest_save() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);

    let request = SaveRequest::default().with_code("etl()", "etl.R");
    store.save("a.json", &json!({"x": 1}), request).unwrap();
    let second = store
        .save("a.json", &json!({"x": 2}), SaveRequest::default())
        .unwrap();

    let sidecar: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("a.json.sidecar.json")).unwrap())
            .unwrap();
    assert_eq!(sidecar["version_id"], second.version_id());
    assert_eq!(sidecar["format"], "json");
}

#[test]
fn test_both_sidecar_encodings_written_and_snapshotted() {
    let dir = TempDir::new().unwrap();
    let mut options = StoreOptions::default();
    options.sidecar_format = SidecarFormat::Both;
    let mut store = Store::open(dir.path(), options).unwrap();

    let outcome = store
        .save("a.json", &json!({"x": 1}), SaveRequest::default())
        .unwrap();

    assert!(dir.path().join("a.json.sidecar.json").exists());
    assert!(dir.path().join("a.json.sidecar.toml").exists());

    let snapshot = dir
        .path()
        .join(format!(".strata/versions/a.json/{}", outcome.version_id()));
    assert!(snapshot.join("a.json").exists());
    assert!(snapshot.join("a.json.sidecar.json").exists());
    assert!(snapshot.join("a.json.sidecar.toml").exists());
}

#[test]
fn test_state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let mut store = open_store(&dir);
        store.save("a.json", &json!({"x": 1}), SaveRequest::default()).unwrap();
        store
            .save(
                "b.json",
                &json!({"x": 2}),
                SaveRequest::default().with_parents(["a.json"]),
            )
            .unwrap();
    }

    let store = open_store(&dir);
    assert_eq!(store.versions("a.json").len(), 1);
    assert_eq!(store.versions("b.json").len(), 1);
    assert!(!store.is_stale("b.json").unwrap());

    let children = store.children_of("a.json", None, None).unwrap();
    assert_eq!(children.len(), 1);
    assert!(children[0].child_path.ends_with("b.json"));
}

#[test]
fn test_out_of_root_artifact_gets_fallback_history() {
    let store_dir = TempDir::new().unwrap();
    let outside_dir = TempDir::new().unwrap();
    let mut store = open_store(&store_dir);

    let outside = outside_dir.path().join("ext.json");
    store.save(&outside, &json!({"x": 1}), SaveRequest::default()).unwrap();
    store.save(&outside, &json!({"x": 2}), SaveRequest::default()).unwrap();

    assert_eq!(store.versions(&outside).len(), 2);
    assert!(store_dir.path().join(".strata/versions/ext").exists());
    assert_eq!(store.read(&outside, &VersionSpec::Offset(1)).unwrap()["x"], 1);
}

#[test]
fn test_reading_missing_artifact_is_not_found() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let err = store.read("ghost.json", &VersionSpec::Latest).unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[test]
fn test_path_spellings_address_one_artifact() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);

    store
        .save("data/a.json", &json!({"x": 1}), SaveRequest::default())
        .unwrap();
    let outcome = store
        .save("data/../data/a.json", &json!({"x": 1}), SaveRequest::default())
        .unwrap();

    assert!(outcome.was_skipped());
    assert_eq!(store.versions("data/a.json").len(), 1);
}
