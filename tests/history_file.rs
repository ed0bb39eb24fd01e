// tests/history_file.rs
//
// JSON file persistence: compatibility, recovery and retention.

use catalog_signals::change_detector::Retention;
use catalog_signals::history::parse_observed_at;
use catalog_signals::{track_and_persist, HistoryBackend, JsonFileBackend, ProductRecord};
use std::fs;

#[test]
fn missing_file_starts_empty_and_is_created() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("price_history.json");
    let backend = JsonFileBackend::new(&path);

    let run = track_and_persist(
        &[ProductRecord::new("ALTE", "A", "1", 10.0, "In Stock")],
        &backend,
        None,
    );
    assert!(run.persisted());
    assert!(path.exists());
    assert!(!path.with_file_name("price_history.json.tmp").exists());
}

#[test]
fn corrupt_file_recovers_to_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("price_history.json");
    fs::write(&path, "{ not json").unwrap();
    let backend = JsonFileBackend::new(&path);
    assert!(backend.load().is_err());

    let run = track_and_persist(
        &[ProductRecord::new("ALTE", "A", "1", 10.0, "In Stock")],
        &backend,
        None,
    );
    assert_eq!(run.changes.new_products.len(), 1);
    assert!(run.persisted());
    assert_eq!(backend.load().unwrap().len(), 1);
}

#[test]
fn reads_legacy_layout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("price_history.json");
    fs::write(
        &path,
        r#"{
  "Soligent_SKU1_1": {
    "price": 100.0,
    "stock_status": "Out of Stock",
    "title": "Panel",
    "last_updated": "2025-01-01 10:00:00",
    "price_history": [{"date": "2025-01-01 10:00:00", "price": 100.0}]
  }
}"#,
    )
    .unwrap();
    let backend = JsonFileBackend::new(&path);

    let rec = ProductRecord::new("Soligent", "SKU1", "1", 85.0, "In Stock")
        .with_last_updated("2025-01-02 10:00:00");
    let run = track_and_persist(&[rec], &backend, None);
    assert_eq!(run.changes.price_drops.len(), 1);
    assert_eq!(run.changes.stock_changes.len(), 1);

    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    let trend = raw["Soligent_SKU1_1"]["price_history"].as_array().unwrap();
    assert_eq!(trend.len(), 2);
    assert_eq!(raw["Soligent_SKU1_1"]["stock_status"], "In Stock");
}

#[test]
fn retention_evicts_stale_keys_when_requested() {
    let dir = tempfile::tempdir().unwrap();
    let backend = JsonFileBackend::new(dir.path().join("h.json"));
    let old = ProductRecord::new("ALTE", "OLD", "1", 5.0, "In Stock")
        .with_last_updated("2025-01-01 00:00:00");
    track_and_persist(&[old], &backend, None);

    let fresh = ProductRecord::new("ALTE", "NEW", "2", 5.0, "In Stock")
        .with_last_updated("2025-06-01 00:00:00");
    let now = parse_observed_at("2025-06-01 12:00:00").unwrap();
    let run = track_and_persist(
        &[fresh],
        &backend,
        Some(Retention { now, keep_days: 90 }),
    );
    assert_eq!(run.history.len(), 1);
    let stored = backend.load().unwrap();
    assert!(stored.contains_key("ALTE_NEW_2"));
    assert!(!stored.contains_key("ALTE_OLD_1"));
}

#[test]
fn null_fields_in_one_entry_do_not_cost_other_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("price_history.json");
    fs::write(
        &path,
        r#"{
  "ALTE_GOOD_1": {
    "price": 100.0,
    "stock_status": "In Stock",
    "price_history": [{"date": "2025-01-01 10:00:00", "price": 100.0}]
  },
  "ALTE_LEGACY_2": {
    "price": 50.0,
    "stock_status": null,
    "last_updated": null,
    "price_history": [{"date": null, "price": 50.0}]
  },
  "ALTE_BROKEN_3": {
    "price": "not a number",
    "price_history": []
  }
}"#,
    )
    .unwrap();
    let backend = JsonFileBackend::new(&path);

    let loaded = backend.load().unwrap();
    assert!(loaded.contains_key("ALTE_GOOD_1"));
    assert_eq!(loaded["ALTE_LEGACY_2"].trend[0].date, "");
    assert!(!loaded.contains_key("ALTE_BROKEN_3"));

    let good = ProductRecord::new("ALTE", "GOOD", "1", 80.0, "In Stock");
    let run = track_and_persist(&[good], &backend, None);
    assert_eq!(run.changes.price_drops.len(), 1);
    assert!(run.changes.new_products.is_empty());

    let stored = backend.load().unwrap();
    assert!(stored.contains_key("ALTE_LEGACY_2"));
    assert_eq!(stored["ALTE_GOOD_1"].price, 80.0);
}
