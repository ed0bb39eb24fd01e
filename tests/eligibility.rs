// tests/eligibility.rs
//
// Authority tables loaded from disk, tiered matching and enrichment flags.

use catalog_signals::authority::load_table_from;
use catalog_signals::{enrich, EligibilityMatcher, MatchTier, ProductRecord, RawTable};
use std::fs;
use std::path::Path;

fn acme_table_a() -> RawTable {
    RawTable::new(&["Manufacturer", "Model", "Domestic Content"])
        .with_row(&["Acme", "X100", "Yes"])
        .with_row(&["Acme", "X200", "No"])
}

#[test]
fn tiers_for_known_and_unknown_models() {
    let m = EligibilityMatcher::from_raw(Some(&acme_table_a()), None);

    let a = m.match_table_a("Acme", Some("X100"));
    assert_eq!((a.approved, a.domestic, a.tier), (true, true, MatchTier::Exact));

    let b = m.match_table_a("Acme", Some("X200"));
    assert_eq!((b.approved, b.domestic, b.tier), (true, false, MatchTier::Exact));

    let c = m.match_table_a("Acme", Some("X999"));
    assert_eq!((c.approved, c.domestic, c.tier), (true, false, MatchTier::ManufacturerOnly));

    let d = m.match_table_a("Globex", Some("X100"));
    assert_eq!(d.tier, MatchTier::NotFound);
    assert!(!d.approved);
}

#[test]
fn missing_tables_never_fail() {
    let m = EligibilityMatcher::from_paths(
        Some(Path::new("/no/such/table_a.json")),
        None,
    );
    assert!(!m.has_table_a());
    let recs = vec![ProductRecord::new("ALTE", "X100", "1", 10.0, "In Stock").with_brand("Acme")];
    let out = enrich(&m, &recs);
    let e = &out.records[0].eligibility;
    assert_eq!(e.table_a_match_tier, MatchTier::NoTable);
    assert!(!e.on_any_authority);
    assert!(!e.domestic_content_qualified);
}

#[test]
fn tables_load_from_json_and_toml_files() {
    let dir = tempfile::tempdir().unwrap();
    let a_path = dir.path().join("table_a.json");
    fs::write(
        &a_path,
        r#"[{"Manufacturer": " acme ", "Model": "x100", "Domestic Content": "Y"}]"#,
    )
    .unwrap();
    let b_path = dir.path().join("table_b.toml");
    fs::write(
        &b_path,
        r#"
[[rows]]
Manufacturer = "Acme"
"Program Type" = "Loans/Leases"
"Domestic Content" = true

[[rows]]
Manufacturer = "ACME"
"Program Type" = "Loans Only"
"Domestic Content" = false
"#,
    )
    .unwrap();

    assert_eq!(load_table_from(&a_path).unwrap().rows.len(), 1);

    let m = EligibilityMatcher::from_paths(Some(&a_path), Some(&b_path));
    let rec = ProductRecord::new("ALTE", "X100", "7", 10.0, "In Stock").with_brand("ACME");
    let out = enrich(&m, &[rec]);
    let e = &out.records[0].eligibility;
    assert_eq!(e.table_a_match_tier, MatchTier::Exact);
    assert!(e.table_a_domestic);
    assert!(e.table_b_approved);
    assert_eq!(e.table_b_program.as_deref(), Some("Loans/Leases"));
    assert!(e.table_b_domestic);
    assert!(e.on_all_authorities);
    assert!(e.domestic_content_qualified);
}

#[test]
fn table_b_without_required_columns_is_no_table() {
    let dir = tempfile::tempdir().unwrap();
    let b_path = dir.path().join("table_b.json");
    fs::write(&b_path, r#"[{"Manufacturer": "Acme", "Domestic Content": "Yes"}]"#).unwrap();
    let m = EligibilityMatcher::from_paths(None, Some(&b_path));
    assert!(!m.has_table_b());
    assert!(!m.match_table_b("Acme").approved);
}

#[test]
fn title_marker_qualifies_without_any_table() {
    let m = EligibilityMatcher::default();
    let rec = ProductRecord::new("ALTE", "Q", "1", 10.0, "In Stock")
        .with_title("Qcells 410W Domestic Content Module");
    let out = enrich(&m, &[rec]);
    assert!(out.records[0].eligibility.domestic_content_qualified);
    assert_eq!(out.summary.domestic_content_qualified, 1);
    assert_eq!(out.summary.on_any_authority, 0);
}

#[test]
fn title_signal_overrides_negative_tables_and_specs() {
    use catalog_signals::Specs;

    let a = RawTable::new(&["Manufacturer", "Model", "Domestic Content"]).with_row(&["Acme", "X200", "No"]);
    let b = RawTable::new(&["Manufacturer", "Program Type", "Domestic Content"])
        .with_row(&["Acme", "Loans Only", "No"]);
    let m = EligibilityMatcher::from_raw(Some(&a), Some(&b));
    let rec = ProductRecord::new("ALTE", "X200", "1", 10.0, "In Stock")
        .with_brand("Acme")
        .with_title("Acme X200 Domestic Content")
        .with_specs(Specs {
            domestic_content: Some("No".into()),
            ..Specs::default()
        });
    let e = &enrich(&m, &[rec]).records[0].eligibility;
    assert!(!e.table_a_domestic);
    assert!(!e.table_b_domestic);
    assert!(e.domestic_signals.title);
    assert!(!e.domestic_signals.specs);
    assert!(e.domestic_content_qualified);
}
